//! Amplitude envelope → LED color sequence.
//!
//! ```text
//! clip samples ──▶ fixed-duration chunks ──▶ mean |x| / clip peak
//!              ──▶ × gain ──▶ √ ──▶ clamp [0, 1] ──▶ HSV lerp(min, max)
//! ```
//!
//! The peak is taken over the whole clip before chunking, so a quiet clip
//! still sweeps the full color range.  `gain` is at least 1.0, which keeps
//! the loudest chunk of a steady clip at exactly the max color.

use std::time::Duration;

use log::warn;

use super::color::{hsv_to_rgb, rgb_to_hsv, Hsv, Rgb};
use crate::audio::AudioClip;
use crate::config::LightConfig;

/// Maps per-chunk amplitude to a color between two configured endpoints.
#[derive(Debug, Clone)]
pub struct AmplitudeMapper {
    min_color: Rgb,
    max_color: Rgb,
    min_hsv: Hsv,
    max_hsv: Hsv,
    chunk: Duration,
    gain: f32,
}

impl AmplitudeMapper {
    /// A `gain` below 1.0 (or non-finite) is replaced by 1.0.
    pub fn new(min_color: Rgb, max_color: Rgb, chunk: Duration, gain: f32) -> Self {
        let gain = if gain.is_finite() && gain >= 1.0 {
            gain
        } else {
            warn!("light: gain {gain} is below 1.0; using 1.0");
            1.0
        };
        let min_color = min_color.clamped();
        let max_color = max_color.clamped();
        Self {
            min_color,
            max_color,
            min_hsv: rgb_to_hsv(min_color),
            max_hsv: rgb_to_hsv(max_color),
            chunk,
            gain,
        }
    }

    pub fn from_config(config: &LightConfig) -> Self {
        Self::new(
            config.min_color,
            config.max_color,
            Duration::from_millis(config.chunk_ms),
            config.gain,
        )
    }

    /// Playback time covered by one color.
    pub fn chunk_duration(&self) -> Duration {
        self.chunk
    }

    /// Samples per chunk at `sample_rate`; never zero.
    pub fn chunk_len(&self, sample_rate: u32) -> usize {
        ((sample_rate as f64 * self.chunk.as_secs_f64()) as usize).max(1)
    }

    /// Normalised loudness per chunk, each in `[0.0, 1.0]`.
    pub fn levels(&self, samples: &[f32], sample_rate: u32) -> Vec<f32> {
        let peak = samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        let peak = if peak == 0.0 { 1.0 } else { peak };

        samples
            .chunks(self.chunk_len(sample_rate))
            .map(|chunk| {
                let mean = chunk.iter().map(|s| s.abs()).sum::<f32>() / chunk.len() as f32;
                let level = (mean / peak * self.gain).sqrt();
                if level.is_nan() {
                    0.0
                } else {
                    level.clamp(0.0, 1.0)
                }
            })
            .collect()
    }

    /// Color for a normalised level.  The endpoints are returned exactly.
    pub fn level_to_color(&self, level: f32) -> Rgb {
        if level.is_nan() || level <= 0.0 {
            return self.min_color;
        }
        if level >= 1.0 {
            return self.max_color;
        }
        hsv_to_rgb(self.min_hsv.lerp(self.max_hsv, level))
    }

    /// One color per chunk of `clip`.
    pub fn colors(&self, clip: &AudioClip) -> Vec<Rgb> {
        self.levels(&clip.samples, clip.sample_rate)
            .into_iter()
            .map(|level| self.level_to_color(level))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
