//! Fixed-rate control loop for one angular actuator.
//!
//! Every actuator gets its own OS thread that ticks at the configured rate:
//!
//! ```text
//! tick ──▶ Profile mode? ── pop next sample as target (or fall back to Seek)
//!      ──▶ move current toward target by ≤ speed × dt
//!      ──▶ clamp to [min_angle, max_angle]
//!      ──▶ write the driver if the angle changed
//! ```
//!
//! Commands ([`ActuatorController::move_to`],
//! [`ActuatorController::submit_profile`]) only touch the shared
//! [`ActuatorState`] under a short lock; the loop picks them up on its next
//! tick.  A newly submitted profile replaces whatever is still playing.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;

use super::profile::{MotionProfile, ProfileError, ResampleOptions};
use crate::config::{ActuatorConfig, ActuatorRole};
use crate::hardware::AngularActuator;

/// Angle changes smaller than this are not sent to the driver.
const WRITE_EPSILON: f64 = 1e-6;

// ---------------------------------------------------------------------------
// ControllerError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("control rate must be positive and finite (got {0} Hz)")]
    InvalidTickRate(f64),

    #[error("actuator limits must be finite (angle {initial} in [{min}, {max}], speed {speed})")]
    InvalidLimits {
        initial: f64,
        min: f64,
        max: f64,
        speed: f64,
    },

    #[error("failed to spawn control thread: {0}")]
    Spawn(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// ActuatorMode / ActuatorState
// ---------------------------------------------------------------------------

/// What drives the target angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorMode {
    /// Move toward an explicitly commanded target.
    Seek,
    /// Consume one resampled profile value per tick.
    Profile,
}

/// Kinematic state advanced once per tick.
#[derive(Debug, Clone)]
pub struct ActuatorState {
    current_angle: f64,
    target_angle: f64,
    seek_speed: f64,
    speed_limit: f64,
    min_angle: f64,
    max_angle: f64,
    mode: ActuatorMode,
    profile: Vec<f64>,
    cursor: usize,
}

impl ActuatorState {
    /// Start at rest in Seek mode.  `min`/`max` are swapped if inverted.
    ///
    /// # Errors
    ///
    /// [`ControllerError::InvalidLimits`] if any argument is NaN or infinite.
    pub fn new(
        initial: f64,
        min_angle: f64,
        max_angle: f64,
        speed_limit: f64,
    ) -> Result<Self, ControllerError> {
        if ![initial, min_angle, max_angle, speed_limit]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ControllerError::InvalidLimits {
                initial,
                min: min_angle,
                max: max_angle,
                speed: speed_limit,
            });
        }
        let (min_angle, max_angle) = if min_angle <= max_angle {
            (min_angle, max_angle)
        } else {
            (max_angle, min_angle)
        };
        let initial = initial.clamp(min_angle, max_angle);
        let speed_limit = speed_limit.abs();
        Ok(Self {
            current_angle: initial,
            target_angle: initial,
            seek_speed: speed_limit,
            speed_limit,
            min_angle,
            max_angle,
            mode: ActuatorMode::Seek,
            profile: Vec::new(),
            cursor: 0,
        })
    }

    pub fn current_angle(&self) -> f64 {
        self.current_angle
    }

    pub fn target_angle(&self) -> f64 {
        self.target_angle
    }

    pub fn mode(&self) -> ActuatorMode {
        self.mode
    }

    /// Profile samples not yet consumed.
    pub fn remaining(&self) -> usize {
        self.profile.len() - self.cursor
    }

    /// Seek toward `angle` at up to `speed` °/s (capped by the speed limit).
    /// Cancels any running profile.  A NaN angle is ignored.
    pub fn set_target(&mut self, angle: f64, speed: f64) {
        if angle.is_nan() {
            warn!("actuator: ignoring NaN target");
            return;
        }
        self.target_angle = angle.clamp(self.min_angle, self.max_angle);
        self.seek_speed = speed.abs().min(self.speed_limit);
        self.mode = ActuatorMode::Seek;
        self.profile.clear();
        self.cursor = 0;
    }

    /// Replace the active profile.  An empty sequence is ignored.
    pub fn load_profile(&mut self, samples: Vec<f64>) {
        if samples.is_empty() {
            return;
        }
        self.profile = samples;
        self.cursor = 0;
        self.mode = ActuatorMode::Profile;
    }

    /// Advance by `dt` seconds and return the new angle.
    pub fn step(&mut self, dt: f64) -> f64 {
        let speed = match self.mode {
            ActuatorMode::Profile => match self.profile.get(self.cursor) {
                Some(&next) => {
                    self.cursor += 1;
                    self.target_angle = next;
                    self.speed_limit
                }
                None => {
                    // Exhausted: hold the last profile value.
                    self.mode = ActuatorMode::Seek;
                    self.seek_speed = self.speed_limit;
                    self.profile.clear();
                    self.cursor = 0;
                    self.seek_speed
                }
            },
            ActuatorMode::Seek => self.seek_speed,
        };

        let max_step = speed * dt.max(0.0);
        let delta = (self.target_angle - self.current_angle).clamp(-max_step, max_step);
        self.current_angle = (self.current_angle + delta).clamp(self.min_angle, self.max_angle);
        self.current_angle
    }
}

// ---------------------------------------------------------------------------
// ActuatorController
// ---------------------------------------------------------------------------

/// Handle to a running actuator control thread.
///
/// Dropping the controller stops and joins the thread.
pub struct ActuatorController {
    name: String,
    role: ActuatorRole,
    rest_angle: f64,
    tick: Duration,
    state: Arc<Mutex<ActuatorState>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ActuatorController {
    /// Spawn the control thread for `config`, ticking at `tick_hz`.
    pub fn spawn(
        config: &ActuatorConfig,
        tick_hz: f64,
        driver: Box<dyn AngularActuator>,
    ) -> Result<Self, ControllerError> {
        if !tick_hz.is_finite() || tick_hz <= 0.0 {
            return Err(ControllerError::InvalidTickRate(tick_hz));
        }
        let tick = Duration::try_from_secs_f64(1.0 / tick_hz)
            .map_err(|_| ControllerError::InvalidTickRate(tick_hz))?;

        let state = Arc::new(Mutex::new(ActuatorState::new(
            config.rest_angle,
            config.min_angle,
            config.max_angle,
            config.speed_limit,
        )?));
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let state = Arc::clone(&state);
            let stop = Arc::clone(&stop);
            let name = config.name.clone();
            std::thread::Builder::new()
                .name(format!("actuator-{}", config.name))
                .spawn(move || control_loop(name, state, stop, tick, driver))?
        };

        info!(
            "{}: control loop started at {tick_hz} Hz ({:?})",
            config.name, config.role
        );

        Ok(Self {
            name: config.name.clone(),
            role: config.role,
            rest_angle: config.rest_angle,
            tick,
            state,
            stop,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ActuatorRole {
        self.role
    }

    /// Seconds between control ticks; the `dt` profiles should be resampled at.
    pub fn tick_period(&self) -> Duration {
        self.tick
    }

    pub fn current_angle(&self) -> f64 {
        self.lock().current_angle()
    }

    pub fn mode(&self) -> ActuatorMode {
        self.lock().mode()
    }

    /// Seek toward `angle` at up to `speed` °/s.
    pub fn move_to(&self, angle: f64, speed: f64) {
        self.lock().set_target(angle, speed);
    }

    /// Seek back to the configured rest angle at full speed.
    pub fn return_to_rest(&self) {
        self.move_to(self.rest_angle, f64::INFINITY);
    }

    /// Resample `profile` at this controller's tick rate and play it,
    /// replacing any profile still running.  Returns the sample count.
    pub fn submit_profile(&self, profile: &MotionProfile) -> Result<usize, ProfileError> {
        let samples = profile.resample(&ResampleOptions::every(self.tick.as_secs_f64()))?;
        let count = samples.len();
        self.lock().load_profile(samples);
        debug!("{}: profile of {count} samples submitted", self.name);
        Ok(count)
    }

    /// Stop the control thread and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop_thread();
    }

    fn stop_thread(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("{}: control thread panicked", self.name);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ActuatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ActuatorController {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

fn control_loop(
    name: String,
    state: Arc<Mutex<ActuatorState>>,
    stop: Arc<AtomicBool>,
    tick: Duration,
    mut driver: Box<dyn AngularActuator>,
) {
    let dt = tick.as_secs_f64();
    let mut last_written: Option<f64> = None;
    let mut failing = false;
    let mut next = Instant::now();

    while !stop.load(Ordering::Acquire) {
        let angle = state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .step(dt);

        let changed = last_written.map_or(true, |prev| (prev - angle).abs() > WRITE_EPSILON);
        if changed {
            match driver.set_angle(angle) {
                Ok(()) => {
                    last_written = Some(angle);
                    if failing {
                        info!("{name}: driver recovered");
                        failing = false;
                    }
                }
                Err(e) => {
                    if !failing {
                        warn!("{name}: driver write failed: {e}");
                        failing = true;
                    }
                }
            }
        }

        next += tick;
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else {
            // Overran the tick; resynchronise instead of bursting.
            next = now;
        }
    }

    debug!("{name}: control loop stopped at {:.2}°", last_written.unwrap_or_default());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
