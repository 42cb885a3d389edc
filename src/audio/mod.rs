//! Audio in and out: chunked capture for recording cycles, WAV staging,
//! in-memory decoding of job results, and playback.
//!
//! # Flow
//!
//! ```text
//! Microphone ─▶ CaptureDevice::open_input ─▶ InputStream::read_chunk (session thread)
//!            ─▶ to_pcm16 ─▶ write_wav (staged file) ─▶ job submission
//!
//! job result bytes ─▶ decode_clip (mono AudioClip)
//!                  ─▶ PlaybackDevice::play (resample_linear to device rate)
//! ```

pub mod capture;
pub mod decode;
pub mod playback;
pub mod resample;
pub mod wav;

pub use capture::{CaptureDevice, CaptureFormat, CpalCapture, InputStream};
pub use decode::{decode_clip, DecodeError};
pub use playback::{CpalPlayback, PlaybackDevice, PlaybackHandle};
pub use resample::{downmix, resample_linear};
pub use wav::{encode_wav, to_pcm16, write_wav};

#[cfg(test)]
pub use capture::{MockCapture, MockCaptureStats};

// ---------------------------------------------------------------------------
// AudioClip
// ---------------------------------------------------------------------------

/// Decoded mono audio ready for playback and amplitude analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Mono samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_duration() {
        assert_eq!(AudioClip::new(vec![0.0; 22_050], 44_100).duration_secs(), 0.5);
        assert_eq!(AudioClip::new(vec![0.0; 10], 0).duration_secs(), 0.0);
    }

    #[test]
    fn clip_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioClip>();
    }
}
