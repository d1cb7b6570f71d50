//! C2 Episodic Memory and C3 Semantic Memory: the two persistent,
//! vector-searchable stores behind the consciousness loop.

pub mod episodic;
pub mod semantic;

pub use episodic::{EpisodicMemory, EpisodicStore, MemoryError, NewEpisode};
pub use semantic::{SemanticError, SemanticItem, SemanticStore};
