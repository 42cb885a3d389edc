//! Background execution of a [`RecordingSession`].
//!
//! Each session runs on its own named OS thread (`recording-<id>`) because
//! capture reads block.  The outcome comes back over a oneshot channel, so
//! the control loop can poll it without blocking ([`SessionHandle::try_outcome`])
//! or wait for it with a deadline ([`SessionHandle::cancel_and_join`]).

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use thiserror::Error;
use tokio::sync::oneshot::{self, error::TryRecvError};

use super::{CancellationFlag, RecordingError, RecordingOutcome, RecordingSession};

/// A cancelled session did not stop within the join deadline.  Its thread
/// is no longer joined and may still hold the capture device.
#[derive(Debug, Error)]
#[error("recording session {session} ignored cancellation for {waited:?}; thread abandoned")]
pub struct CancellationRace {
    pub session: u64,
    pub waited: Duration,
    straggler: Option<JoinHandle<()>>,
}

impl CancellationRace {
    /// The abandoned thread, so the caller can tell when it finally exits.
    pub fn into_straggler(self) -> Option<JoinHandle<()>> {
        self.straggler
    }
}

pub struct SessionHandle {
    id: u64,
    cancel: CancellationFlag,
    outcome: oneshot::Receiver<RecordingOutcome>,
    thread: Option<JoinHandle<()>>,
    started: Instant,
}

impl SessionHandle {
    /// Start `session` on a new thread, recording for `duration_secs`.
    pub fn spawn(
        id: u64,
        mut session: RecordingSession,
        duration_secs: f64,
    ) -> std::io::Result<Self> {
        let cancel = CancellationFlag::new();
        let flag = cancel.clone();
        let (tx, rx) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name(format!("recording-{id}"))
            .spawn(move || {
                let outcome = session.run(duration_secs, &flag);
                // The handle may already be gone (abandoned); nothing to do then.
                let _ = tx.send(outcome);
            })?;

        debug!("recording-{id}: started ({duration_secs} s)");

        Ok(Self {
            id,
            cancel,
            outcome: rx,
            thread: Some(thread),
            started: Instant::now(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn cancellation_flag(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// The outcome if the session has finished, without blocking.
    pub fn try_outcome(&mut self) -> Option<RecordingOutcome> {
        match self.outcome.try_recv() {
            Ok(outcome) => {
                self.join();
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                self.join();
                Some(RecordingOutcome::failed(RecordingError::WorkerLost))
            }
        }
    }

    /// Raise the cancellation flag and wait up to `timeout` for the session
    /// to report.  On timeout the thread is detached and a
    /// [`CancellationRace`] is returned.
    pub async fn cancel_and_join(
        mut self,
        timeout: Duration,
    ) -> Result<RecordingOutcome, CancellationRace> {
        self.cancel.cancel();

        match tokio::time::timeout(timeout, &mut self.outcome).await {
            Ok(Ok(outcome)) => {
                self.join();
                Ok(outcome)
            }
            Ok(Err(_)) => {
                self.join();
                Ok(RecordingOutcome::failed(RecordingError::WorkerLost))
            }
            Err(_) => {
                // The thread keeps running until its blocked read returns.
                Err(CancellationRace {
                    session: self.id,
                    waited: timeout,
                    straggler: self.thread.take(),
                })
            }
        }
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("recording-{}: thread panicked", self.id);
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.thread.take().is_some() {
            self.cancel.cancel();
            warn!("recording-{}: handle dropped while running; cancelled", self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
