//! Neural network building blocks for the book rating models.
//!
//! Provides a small row-major [`tensor::Tensor`], the [`layer::Layer`]
//! trait, dense layers and MLPs, and the recommender-specific pieces:
//!
//! - [`embedding::FeaturesEmbedding`] / [`embedding::FeaturesLinear`]: tables
//!   indexed by encoded field vectors, one offset block per field
//! - [`fm::FactorizationMachine`]: second-order FM interaction, and
//!   [`fm::DenseFactorizationMachine`] over a dense feature vector
//! - [`ffm::FieldAwareInteraction`]: field-aware FM interaction
//! - [`cross::CrossNetwork`]: DCN cross layers
//!
//! All randomness is drawn from a caller-supplied seeded `StdRng`.

pub mod activation;
pub mod cross;
pub mod dense;
pub mod dropout;
pub mod embedding;
pub mod error;
pub mod ffm;
pub mod fm;
pub mod initializer;
pub mod layer;
pub mod mlp;
pub mod tensor;

pub use activation::ActivationType;
pub use cross::CrossNetwork;
pub use dense::Dense;
pub use dropout::Dropout;
pub use embedding::{FeaturesEmbedding, FeaturesLinear, FieldOffsets};
pub use error::{LayerError, LayerResult};
pub use ffm::FieldAwareInteraction;
pub use fm::{DenseFactorizationMachine, FactorizationMachine};
pub use initializer::Initializer;
pub use layer::Layer;
pub use mlp::MLP;
pub use tensor::Tensor;
