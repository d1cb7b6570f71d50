//! C4 Working Memory, C6 Attention/Salience, and C7 Prediction: the three
//! "fast" cognitive modules that don't need a relational store of their
//! own, grouped into one crate per spec.md's component table.

pub mod attention;
pub mod prediction;
pub mod working_memory;

pub use attention::{AttentionScorer, AttentionWeights};
pub use prediction::{situation_key, PredictionEngine, WorldModelEntry};
pub use working_memory::{WorkingItem, WorkingMemory, CURRENT_TURN_TAG, HARD_CAP};
