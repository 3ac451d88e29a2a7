//! Command-line interface for the book rating pipeline.
//!
//! - **train**: cross-validates one model family and writes the submission
//! - **inspect**: encodes the dataset and reports its schema and folds
//!
//! # Example
//!
//! ```bash
//! # Five-fold DCN with rounded submission
//! bookrec train --data-path /opt/ml/data --model DCN --epochs 20 --round
//!
//! # Base configuration from a file, overridden by flags
//! bookrec train --config run.json --lr 0.001
//!
//! # Show the encoded schema
//! bookrec inspect --data-path /opt/ml/data
//! ```

pub mod commands;

use clap::{Parser, Subcommand};

pub use commands::{InspectCommand, TrainCommand};

/// Book rating prediction: encoding, k-fold training and submission output.
#[derive(Parser, Debug)]
#[command(name = "bookrec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a model family over the configured folds
    Train(TrainCommand),

    /// Encode the dataset and print its schema
    Inspect(InspectCommand),
}
