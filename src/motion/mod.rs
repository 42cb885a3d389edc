//! Actuator motion: keyframed profiles, the per-actuator control loop, and
//! the breathing curve played during playback.
//!
//! ```text
//! BreathingCurve ──▶ MotionProfile ──resample(dt = 1 / tick_hz)──▶ Vec<f64>
//!                                                              │
//!                     ActuatorController (one thread each) ◀───┘
//!                        └─ rate-limit + clamp ─▶ AngularActuator
//! ```

pub mod breathing;
pub mod controller;
pub mod profile;

pub use breathing::{beat_period, BreathingCurve};
pub use controller::{ActuatorController, ActuatorMode, ActuatorState, ControllerError};
pub use profile::{BoundaryPolicy, Keyframe, MotionProfile, ProfileError, ResampleOptions};
