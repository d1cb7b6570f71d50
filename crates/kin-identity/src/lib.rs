//! C1 Identity Store: the persona's singleton self-model (growth phase,
//! bond strength, traits) and its persistence.

pub mod model;
pub mod store;

pub use model::{GrowthMilestone, GrowthPhase, Identity, Trait};
pub use store::{IdentityError, IdentityStore};
