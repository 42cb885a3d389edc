//! Peripheral capabilities: status LED, angular actuators, environment
//! sensors.
//!
//! Each peripheral is a small trait so the control loops never depend on a
//! particular GPIO / PWM / I²C driver.  [`simulated`] holds the stand-ins
//! used on machines without the installation hardware attached.

pub mod simulated;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::light::Rgb;

pub use simulated::{FixedSensor, LogActuator, LogLed};

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Failures reported by any peripheral, audio devices included.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("no {0} device is available")]
    Unavailable(String),

    #[error("failed to open {device}: {reason}")]
    Open { device: String, reason: String },

    #[error("{device} I/O failed: {reason}")]
    Io { device: String, reason: String },

    #[error("{0} timed out")]
    Timeout(String),
}

impl DeviceError {
    pub fn open(device: impl Into<String>, reason: impl ToString) -> Self {
        Self::Open {
            device: device.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(device: impl Into<String>, reason: impl ToString) -> Self {
        Self::Io {
            device: device.into(),
            reason: reason.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// An RGB status light.
pub trait Led: Send {
    fn set_color(&mut self, color: Rgb) -> Result<(), DeviceError>;

    fn off(&mut self) -> Result<(), DeviceError> {
        self.set_color(Rgb::BLACK)
    }
}

/// A positional actuator driven by an angle in degrees.
pub trait AngularActuator: Send {
    fn set_angle(&mut self, degrees: f64) -> Result<(), DeviceError>;
}

/// Ambient readings attached to every job submission.
pub trait EnvironmentSensor: Send + Sync {
    fn read(&self) -> Result<EnvironmentReading, DeviceError>;
}

// ---------------------------------------------------------------------------
// EnvironmentReading
// ---------------------------------------------------------------------------

/// One snapshot of the room: °C, hPa, %RH and lux.
///
/// The all-zero default doubles as the placeholder submitted when the
/// sensors cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvironmentReading {
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub lux: f64,
}
