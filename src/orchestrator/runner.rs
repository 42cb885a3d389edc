//! The control loop.
//!
//! [`Orchestrator`] owns the active recording session, the task registry and
//! the playback path, and advances them together on a fixed tick.
//!
//! # Tick
//!
//! ```text
//! 0. reap      session thread reported?  ──▶ count it; keep a Completed WAV
//! 1. switch    drain presses; per press take one completed task:
//!                none  ──▶ nothing happens, recording continues
//!                found ──▶ cancel + join active session (bounded)
//!                          └─▶ spawn_blocking(playback.play)   [Playing]
//! 2. record    no active session ──▶ start `cycle-NNNNN.wav`   [Recording]
//! 3. submit    kept WAV + sensor reading ──▶ registry.submit   [Submitting]
//!              then the WAV is deleted
//! ```
//!
//! A session that ignores cancellation past the join timeout is abandoned
//! and logged as critical.  No new session opens the capture device until
//! that thread has exited.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::time::MissedTickBehavior;

use super::playback::Playback;
use super::state::{new_shared_status, CycleState, OrchestratorStatus, SharedStatus};
use crate::audio::{CaptureDevice, CaptureFormat};
use crate::config::AppConfig;
use crate::hardware::{EnvironmentReading, EnvironmentSensor};
use crate::recording::{RecordingOutcome, RecordingSession, SessionHandle, SessionState};
use crate::switch::SwitchEvents;
use crate::tasks::{JobSubmission, TaskRecord, TaskRegistry};

// ---------------------------------------------------------------------------
// OrchestratorSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub tick: Duration,
    /// How long a cancelled session gets to stop before it is abandoned.
    pub join_timeout: Duration,
    pub recording_secs: f64,
    pub format: CaptureFormat,
    /// Where cycle WAVs are staged until submission.
    pub recordings_dir: PathBuf,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig, recordings_dir: PathBuf) -> Self {
        Self {
            tick: Duration::from_millis(config.orchestrator.tick_ms.max(1)),
            join_timeout: Duration::from_millis(config.orchestrator.join_timeout_ms),
            recording_secs: config.recording.duration_secs,
            format: config.recording.capture_format(),
            recordings_dir,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    settings: OrchestratorSettings,
    capture: Arc<dyn CaptureDevice>,
    sensor: Arc<dyn EnvironmentSensor>,
    registry: Arc<TaskRegistry>,
    playback: Arc<dyn Playback>,
    status: SharedStatus,
    active: Option<SessionHandle>,
    /// Thread of a session abandoned after a cancellation race.
    straggler: Option<JoinHandle<()>>,
    /// Completed cycle WAVs waiting for submission.
    pending: Vec<PathBuf>,
    sessions: u64,
}

impl Orchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        capture: Arc<dyn CaptureDevice>,
        sensor: Arc<dyn EnvironmentSensor>,
        registry: Arc<TaskRegistry>,
        playback: Arc<dyn Playback>,
    ) -> Self {
        Self {
            settings,
            capture,
            sensor,
            registry,
            playback,
            status: new_shared_status(),
            active: None,
            straggler: None,
            pending: Vec::new(),
            sessions: 0,
        }
    }

    pub fn status(&self) -> SharedStatus {
        Arc::clone(&self.status)
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_session_id(&self) -> Option<u64> {
        self.active.as_ref().map(SessionHandle::id)
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Tick until `shutdown` resolves or every switch bridge is dropped,
    /// then cancel the active session.
    pub async fn run<F>(mut self, mut events: SwitchEvents, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.settings.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "orchestrator: running ({} s cycles, {:?} tick)",
            self.settings.recording_secs, self.settings.tick
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("orchestrator: shutdown requested");
                    break;
                }
                _ = interval.tick() => {
                    self.tick(&mut events).await;
                    if events.is_closed() {
                        info!("orchestrator: switch channel closed");
                        break;
                    }
                }
            }
        }

        self.cancel_active().await;
        self.submit_pending().await;
        self.set_cycle(CycleState::Idle);
        info!("orchestrator: stopped");
    }

    /// One pass of the control loop.
    pub async fn tick(&mut self, events: &mut SwitchEvents) {
        self.reap();

        let presses = events.drain();
        if presses > 0 {
            self.handle_presses(presses).await;
        }

        if self.active.is_none() {
            self.start_session();
        }

        self.submit_pending().await;
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    fn reap(&mut self) {
        let outcome = match self.active.as_mut() {
            Some(handle) => handle.try_outcome(),
            None => return,
        };
        if let Some(outcome) = outcome {
            self.active = None;
            self.record_outcome(outcome);
        }
    }

    async fn handle_presses(&mut self, presses: usize) {
        debug!("switch: {presses} press(es)");
        for _ in 0..presses {
            let Some(task) = self.registry.take_first_completed().await else {
                info!("switch: no completed task yet; recording continues");
                return;
            };
            self.cancel_active().await;
            self.play(task).await;
        }
    }

    async fn cancel_active(&mut self) {
        let Some(handle) = self.active.take() else {
            return;
        };
        let id = handle.id();
        debug!("orchestrator: cancelling recording-{id}");

        match handle.cancel_and_join(self.settings.join_timeout).await {
            Ok(outcome) => self.record_outcome(outcome),
            Err(race) => {
                error!("CRITICAL: {race}");
                {
                    let mut status = self.lock_status();
                    status.cancellation_races += 1;
                    status.last_error = Some(race.to_string());
                }
                self.straggler = race.into_straggler();
                self.set_cycle(CycleState::Idle);
            }
        }
    }

    async fn play(&mut self, task: TaskRecord) {
        self.set_cycle(CycleState::Playing);
        let id = task.id.clone();
        let playback = Arc::clone(&self.playback);

        let result = tokio::task::spawn_blocking(move || playback.play(&task)).await;

        {
            let mut status = self.lock_status();
            match result {
                Ok(Ok(())) => {
                    info!("playback: task {id} finished");
                    status.playbacks += 1;
                }
                Ok(Err(e)) => {
                    warn!("playback: task {id} failed: {e}");
                    status.playback_failures += 1;
                    status.last_error = Some(e.to_string());
                }
                Err(e) => {
                    error!("playback: task {id} worker crashed: {e}");
                    status.playback_failures += 1;
                    status.last_error = Some(e.to_string());
                }
            }
        }
        self.set_cycle(CycleState::Idle);
    }

    fn start_session(&mut self) {
        if let Some(thread) = &self.straggler {
            if !thread.is_finished() {
                debug!("orchestrator: waiting for abandoned session to release the device");
                return;
            }
        }
        if let Some(thread) = self.straggler.take() {
            if thread.join().is_err() {
                warn!("orchestrator: abandoned session thread panicked");
            }
        }

        self.sessions += 1;
        let id = self.sessions;
        let path = self
            .settings
            .recordings_dir
            .join(format!("cycle-{id:05}.wav"));
        let session = RecordingSession::new(Arc::clone(&self.capture), self.settings.format, path);

        match SessionHandle::spawn(id, session, self.settings.recording_secs) {
            Ok(handle) => {
                info!("orchestrator: recording-{id} started");
                self.active = Some(handle);
                self.lock_status().sessions_started += 1;
                self.set_cycle(CycleState::Recording);
            }
            Err(e) => {
                warn!("orchestrator: could not start recording-{id}: {e}");
                self.lock_status().last_error = Some(e.to_string());
            }
        }
    }

    async fn submit_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.set_cycle(CycleState::Submitting);

        for path in std::mem::take(&mut self.pending) {
            match tokio::fs::read(&path).await {
                Ok(audio) => {
                    let readings = self.read_sensors();
                    match self.registry.submit(&JobSubmission { audio, readings }).await {
                        Ok(_) => self.lock_status().submitted += 1,
                        Err(e) => {
                            warn!("submit: {} dropped: {e}", path.display());
                            let mut status = self.lock_status();
                            status.submission_failures += 1;
                            status.last_error = Some(e.to_string());
                        }
                    }
                }
                Err(e) => {
                    warn!("submit: cannot read {}: {e}", path.display());
                    self.lock_status().submission_failures += 1;
                }
            }

            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("submit: could not delete {}: {e}", path.display());
            }
        }

        let cycle = if self.active.is_some() {
            CycleState::Recording
        } else {
            CycleState::Idle
        };
        self.set_cycle(cycle);
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn read_sensors(&self) -> EnvironmentReading {
        self.sensor.read().unwrap_or_else(|e| {
            warn!("sensors: read failed, submitting zeros: {e}");
            EnvironmentReading::default()
        })
    }

    fn record_outcome(&mut self, outcome: RecordingOutcome) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        match outcome.status {
            SessionState::Completed => {
                status.sessions_completed += 1;
                if let Some(path) = outcome.sample_path {
                    self.pending.push(path);
                }
            }
            SessionState::Interrupted => status.sessions_interrupted += 1,
            SessionState::Error => {
                status.sessions_failed += 1;
                if let Some(e) = outcome.error {
                    warn!("orchestrator: recording failed: {e}");
                    status.last_error = Some(e.to_string());
                }
            }
            SessionState::Idle | SessionState::Recording => {}
        }
        status.cycle = CycleState::Idle;
    }

    fn set_cycle(&self, cycle: CycleState) {
        let mut status = self.lock_status();
        if status.cycle != cycle {
            debug!("orchestrator: {} -> {}", status.cycle.label(), cycle.label());
            status.cycle = cycle;
        }
    }

    fn lock_status(&self) -> MutexGuard<'_, OrchestratorStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
