//! C8 Global Workspace and C11 Consciousness Loop: the orchestrator that
//! wires every other Kin crate together into the ten-phase turn cycle.

pub mod global_workspace;
#[path = "loop.rs"]
pub mod consciousness_loop;
pub mod turn;

pub use consciousness_loop::{ConsciousnessError, ConsciousnessLoop, TurnOutcome};
pub use global_workspace::GlobalWorkspace;
pub use turn::Turn;
