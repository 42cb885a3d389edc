//! Cycle state and counters shared with observers.
//!
//! ```text
//! Idle ──start session──▶ Recording ──Completed──▶ Submitting ──▶ Idle
//!                              │   └─Interrupted / Error───────────▶ Idle
//!                              └─switch + completed task──▶ Playing ──▶ Idle
//! ```

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    #[default]
    Idle,
    Recording,
    Submitting,
    Playing,
}

impl CycleState {
    pub fn label(&self) -> &'static str {
        match self {
            CycleState::Idle => "Idle",
            CycleState::Recording => "Recording",
            CycleState::Submitting => "Submitting",
            CycleState::Playing => "Playing",
        }
    }
}

/// Snapshot of what the control loop has done so far.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorStatus {
    pub cycle: CycleState,
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub sessions_interrupted: u64,
    pub sessions_failed: u64,
    pub submitted: u64,
    pub submission_failures: u64,
    pub playbacks: u64,
    pub playback_failures: u64,
    /// Sessions abandoned because they ignored cancellation.
    pub cancellation_races: u64,
    pub last_error: Option<String>,
}

/// Cheap to clone; never hold the lock across `.await`.
pub type SharedStatus = Arc<Mutex<OrchestratorStatus>>;

pub fn new_shared_status() -> SharedStatus {
    Arc::new(Mutex::new(OrchestratorStatus::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_with_zero_counters() {
        let status = new_shared_status();
        let s = status.lock().unwrap();
        assert_eq!(s.cycle, CycleState::Idle);
        assert_eq!(s.sessions_started, 0);
        assert!(s.last_error.is_none());
    }

    #[test]
    fn labels() {
        assert_eq!(CycleState::Idle.label(), "Idle");
        assert_eq!(CycleState::Submitting.label(), "Submitting");
        assert_eq!(CycleState::Playing.label(), "Playing");
    }
}
