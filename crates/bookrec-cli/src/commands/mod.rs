//! Subcommand implementations.

mod inspect;
mod train;

pub use inspect::InspectCommand;
pub use train::{CheckpointFormatArg, TrainCommand};
