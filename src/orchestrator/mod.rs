//! Root control loop: recording cycles, switch handling, submission and
//! playback.

pub mod playback;
pub mod runner;
pub mod state;

pub use playback::{Playback, PlaybackCoordinator, PlaybackError};
pub use runner::{Orchestrator, OrchestratorSettings};
pub use state::{new_shared_status, CycleState, OrchestratorStatus, SharedStatus};

#[cfg(test)]
pub use playback::MockPlayback;
