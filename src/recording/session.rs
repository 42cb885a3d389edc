//! One bounded capture cycle.
//!
//! ```text
//! Idle ──run──▶ Recording ──target chunks read──▶ persist ──▶ Completed
//!                  │   └─ cancel flag seen after a chunk ──────▶ Interrupted
//!                  └─ open / read / persist failure ───────────▶ Error
//! ```
//!
//! The cancellation flag is checked before the first read and after every
//! chunk, so an interrupt costs at most one chunk of latency.  It is checked
//! once more after the WAV is written: a cancel that lands while the file is
//! being saved removes it again.  Interrupted audio is discarded; only
//! completed cycles are persisted.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;

use super::CancellationFlag;
use crate::audio::{to_pcm16, write_wav, CaptureDevice, CaptureFormat};
use crate::hardware::DeviceError;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    Interrupted,
    Completed,
    Error,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Interrupted | SessionState::Completed | SessionState::Error
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Recording => "Recording",
            SessionState::Interrupted => "Interrupted",
            SessionState::Completed => "Completed",
            SessionState::Error => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingError / RecordingOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("failed to write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("recording thread exited without reporting an outcome")]
    WorkerLost,
}

/// Terminal result of [`RecordingSession::run`].
#[derive(Debug)]
pub struct RecordingOutcome {
    pub status: SessionState,
    /// Set only for [`SessionState::Completed`].
    pub sample_path: Option<PathBuf>,
    /// Set only for [`SessionState::Error`].
    pub error: Option<RecordingError>,
}

impl RecordingOutcome {
    pub fn completed(path: PathBuf) -> Self {
        Self {
            status: SessionState::Completed,
            sample_path: Some(path),
            error: None,
        }
    }

    pub fn interrupted() -> Self {
        Self {
            status: SessionState::Interrupted,
            sample_path: None,
            error: None,
        }
    }

    pub fn failed(error: RecordingError) -> Self {
        Self {
            status: SessionState::Error,
            sample_path: None,
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingSession
// ---------------------------------------------------------------------------

pub struct RecordingSession {
    capture: Arc<dyn CaptureDevice>,
    format: CaptureFormat,
    output_path: PathBuf,
    state: SessionState,
    duration_target: usize,
    captured: Vec<i16>,
}

impl RecordingSession {
    /// A session that will write its WAV to `output_path` on completion.
    pub fn new(capture: Arc<dyn CaptureDevice>, format: CaptureFormat, output_path: PathBuf) -> Self {
        Self {
            capture,
            format,
            output_path,
            state: SessionState::Idle,
            duration_target: 0,
            captured: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Chunks the current run aims for; zero before [`run`](Self::run).
    pub fn duration_target(&self) -> usize {
        self.duration_target
    }

    /// Capture `duration_secs` of audio unless `cancel` is raised first.
    /// Blocks the calling thread.
    pub fn run(&mut self, duration_secs: f64, cancel: &CancellationFlag) -> RecordingOutcome {
        self.captured.clear();
        self.duration_target = self.format.chunks_for(duration_secs);

        if cancel.is_cancelled() {
            return self.interrupt();
        }

        let mut stream = match self.capture.open_input(&self.format) {
            Ok(stream) => stream,
            Err(e) => return self.fail(e.into()),
        };
        self.state = SessionState::Recording;
        self.captured
            .reserve_exact(self.duration_target * self.format.chunk_samples());
        debug!(
            "session: recording {} chunks into {}",
            self.duration_target,
            self.output_path.display()
        );

        for _ in 0..self.duration_target {
            match stream.read_chunk() {
                Ok(chunk) => self.captured.extend(chunk.iter().copied().map(to_pcm16)),
                Err(e) => {
                    drop(stream);
                    return self.fail(e.into());
                }
            }
            if cancel.is_cancelled() {
                drop(stream);
                return self.interrupt();
            }
        }
        drop(stream);

        let outcome = self.persist();
        if outcome.status == SessionState::Completed && cancel.is_cancelled() {
            debug!("session: cancelled while saving; removing the file");
            self.remove_output();
            return self.interrupt();
        }
        outcome
    }

    fn persist(&mut self) -> RecordingOutcome {
        let result = write_wav(
            &self.output_path,
            &self.captured,
            self.format.channels,
            self.format.sample_rate,
        );
        self.captured = Vec::new();

        match result {
            Ok(()) => {
                self.state = SessionState::Completed;
                info!("session: cycle saved to {}", self.output_path.display());
                RecordingOutcome::completed(self.output_path.clone())
            }
            Err(source) => {
                // Never leave a half-written file for the submitter to find.
                self.remove_output();
                self.fail(RecordingError::Persist {
                    path: self.output_path.clone(),
                    source,
                })
            }
        }
    }

    fn remove_output(&self) {
        if self.output_path.is_file() {
            if let Err(e) = std::fs::remove_file(&self.output_path) {
                warn!("session: could not remove {}: {e}", self.output_path.display());
            }
        }
    }

    fn interrupt(&mut self) -> RecordingOutcome {
        self.captured = Vec::new();
        self.state = SessionState::Interrupted;
        debug!("session: interrupted, buffered audio discarded");
        RecordingOutcome::interrupted()
    }

    fn fail(&mut self, error: RecordingError) -> RecordingOutcome {
        self.captured = Vec::new();
        self.state = SessionState::Error;
        warn!("session: {error}");
        RecordingOutcome::failed(error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
