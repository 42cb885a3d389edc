//! Jellyfish: an ambient sound installation controller.
//!
//! The installation records the room in fixed-length cycles, sends each
//! cycle (with temperature, pressure, humidity and light readings) to a
//! remote job service, and when a visitor presses the button plays back a
//! finished job while an LED follows the loudness and a servo "breathes" in
//! time.

pub mod audio;
pub mod config;
pub mod hardware;
pub mod light;
pub mod motion;
pub mod orchestrator;
pub mod recording;
pub mod switch;
pub mod tasks;
