//! Simulated collaborators for the teleoperation stack.
//!
//! Used by the CLI when no vendor driver is linked and by integration tests.
pub mod error;
pub mod glove;
pub mod robot;

pub use glove::{GloveSim, SimulatedGlove};
pub use robot::{SimulatedGripper, SimulatedRobot};
