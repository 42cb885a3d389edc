//! Log-backed stand-ins for the installation peripherals.

use log::{debug, trace};

use super::{AngularActuator, DeviceError, EnvironmentReading, EnvironmentSensor, Led};
use crate::light::Rgb;

/// LED that records its last color and traces every change.
#[derive(Debug, Default)]
pub struct LogLed {
    last: Option<Rgb>,
}

impl LogLed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_color(&self) -> Option<Rgb> {
        self.last
    }
}

impl Led for LogLed {
    fn set_color(&mut self, color: Rgb) -> Result<(), DeviceError> {
        if self.last != Some(color) {
            trace!("led: ({:.3}, {:.3}, {:.3})", color.r, color.g, color.b);
        }
        self.last = Some(color);
        Ok(())
    }

    fn off(&mut self) -> Result<(), DeviceError> {
        debug!("led: off");
        self.last = Some(Rgb::BLACK);
        Ok(())
    }
}

/// Actuator that only logs the commanded angle.
#[derive(Debug)]
pub struct LogActuator {
    name: String,
}

impl LogActuator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl AngularActuator for LogActuator {
    fn set_angle(&mut self, degrees: f64) -> Result<(), DeviceError> {
        trace!("{}: {:.2}°", self.name, degrees);
        Ok(())
    }
}

/// Sensor that always reports the same configured values.
#[derive(Debug, Clone, Copy)]
pub struct FixedSensor {
    reading: EnvironmentReading,
}

impl FixedSensor {
    pub fn new(reading: EnvironmentReading) -> Self {
        Self { reading }
    }
}

impl EnvironmentSensor for FixedSensor {
    fn read(&self) -> Result<EnvironmentReading, DeviceError> {
        Ok(self.reading)
    }
}
