//! Clip playback through the default output device.
//!
//! [`PlaybackDevice::play`] starts a clip and returns immediately with a
//! [`PlaybackHandle`]; the caller polls [`PlaybackHandle::is_playing`] while
//! it drives the LED and actuators.  Dropping the handle stops the stream.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::{resample_linear, AudioClip};
use crate::hardware::DeviceError;

const DEVICE: &str = "audio output";

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

pub trait PlaybackHandle {
    fn is_playing(&self) -> bool;
    fn stop(&mut self);
}

pub trait PlaybackDevice: Send + Sync {
    fn play(&self, clip: &AudioClip) -> Result<Box<dyn PlaybackHandle>, DeviceError>;
}

// ---------------------------------------------------------------------------
// CpalPlayback
// ---------------------------------------------------------------------------

/// Plays mono clips on every channel of the default output device, resampled
/// to the device's native rate.
#[derive(Debug, Default)]
pub struct CpalPlayback;

impl CpalPlayback {
    pub fn new() -> Self {
        Self
    }
}

impl PlaybackDevice for CpalPlayback {
    fn play(&self, clip: &AudioClip) -> Result<Box<dyn PlaybackHandle>, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| DeviceError::Unavailable(DEVICE.into()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| DeviceError::open(DEVICE, e))?;

        let channels = supported.channels().max(1) as usize;
        let rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let samples: Arc<[f32]> = resample_linear(&clip.samples, clip.sample_rate, rate).into();
        let position = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let stopped = Arc::clone(&stopped);
            device
                .build_output_stream(
                    &config,
                    move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut pos = position.load(Ordering::Acquire);
                        let halted = stopped.load(Ordering::Acquire);
                        for frame in out.chunks_mut(channels) {
                            let value = if halted {
                                0.0
                            } else {
                                samples.get(pos).copied().unwrap_or(0.0)
                            };
                            frame.fill(value);
                            pos += 1;
                        }
                        position.store(pos, Ordering::Release);
                    },
                    |err: cpal::StreamError| {
                        log::error!("cpal output stream error: {err}");
                    },
                    None,
                )
                .map_err(|e| DeviceError::open(DEVICE, e))?
        };
        stream.play().map_err(|e| DeviceError::open(DEVICE, e))?;

        log::debug!(
            "playback: {:.1} s at {rate} Hz on {channels} channel(s)",
            samples.len() as f64 / rate.max(1) as f64
        );

        Ok(Box::new(CpalPlaybackHandle {
            _stream: stream,
            len: samples.len(),
            position,
            stopped,
        }))
    }
}

struct CpalPlaybackHandle {
    _stream: cpal::Stream,
    len: usize,
    position: Arc<AtomicUsize>,
    stopped: Arc<AtomicBool>,
}

impl PlaybackHandle for CpalPlaybackHandle {
    fn is_playing(&self) -> bool {
        !self.stopped.load(Ordering::Acquire) && self.position.load(Ordering::Acquire) < self.len
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::Release);
    }
}
