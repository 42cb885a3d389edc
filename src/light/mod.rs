//! Playback-synchronised lighting: color math and the amplitude → color
//! mapper.

pub mod color;
pub mod mapper;

pub use color::{hsv_to_rgb, rgb_to_hsv, Hsv, Rgb};
pub use mapper::AmplitudeMapper;
