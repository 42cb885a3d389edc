//! Ambient recording cycles.
//!
//! A [`RecordingSession`] captures one fixed-length cycle on a blocking
//! thread; a [`SessionHandle`] owns that thread and its
//! [`CancellationFlag`].

pub mod handle;
pub mod session;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

pub use handle::{CancellationRace, SessionHandle};
pub use session::{RecordingError, RecordingOutcome, RecordingSession, SessionState};

/// Shared stop request, set from the control loop and read by the session.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let a = CancellationFlag::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }
}
