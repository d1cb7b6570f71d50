//! Shared types used across every Kin crate: embeddings, clamped scores,
//! and the small config primitives the rest of the workspace reads from
//! the environment.

pub mod config;
pub mod embedding;
pub mod score;
pub mod thought;

pub use config::CoreConfig;
pub use embedding::Embedding;
pub use score::UnitScore;
pub use thought::{CognitiveModule, SensoryInput, SourceModule, Thought};
