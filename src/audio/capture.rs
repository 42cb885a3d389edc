//! Blocking, chunked microphone capture.
//!
//! A recording session opens an [`InputStream`] on its own thread and pulls
//! fixed-size chunks from it until the cycle is done or cancelled.  Dropping
//! the stream closes the device.
//!
//! [`CpalCapture`] bridges cpal's callback model to that pull model: the
//! callback forwards every hardware buffer over an mpsc channel and
//! [`InputStream::read_chunk`] accumulates buffers until a full chunk is
//! available.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::config::RecordingConfig;
use crate::hardware::DeviceError;

const DEVICE: &str = "audio input";

// ---------------------------------------------------------------------------
// CaptureFormat
// ---------------------------------------------------------------------------

/// Requested stream shape.  Samples are interleaved `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per [`InputStream::read_chunk`] call.
    pub chunk_frames: usize,
}

impl CaptureFormat {
    /// Interleaved samples per chunk.
    pub fn chunk_samples(&self) -> usize {
        self.chunk_frames * self.channels as usize
    }

    /// Whole chunks in `secs` seconds: `floor(rate / chunk * secs)`, at
    /// least one.
    pub fn chunks_for(&self, secs: f64) -> usize {
        if self.chunk_frames == 0 || !secs.is_finite() || secs <= 0.0 {
            return 1;
        }
        let chunks = (self.sample_rate as f64 / self.chunk_frames as f64 * secs).floor();
        (chunks as usize).max(1)
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// An open input stream, owned by exactly one recording session.
pub trait InputStream {
    /// Block until one chunk of `chunk_samples()` samples is available.
    fn read_chunk(&mut self) -> Result<Vec<f32>, DeviceError>;
}

/// Source of input streams.  Shared by every session.
pub trait CaptureDevice: Send + Sync {
    fn open_input(&self, format: &CaptureFormat) -> Result<Box<dyn InputStream>, DeviceError>;
}

// ---------------------------------------------------------------------------
// CpalCapture
// ---------------------------------------------------------------------------

/// Capture device backed by the default cpal host.
pub struct CpalCapture {
    device_name: Option<String>,
    read_timeout: Duration,
}

impl CpalCapture {
    pub fn new(device_name: Option<String>, read_timeout: Duration) -> Self {
        Self {
            device_name,
            read_timeout,
        }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new(config.input_device.clone(), config.read_timeout())
    }

    /// Check that the configured input device exists, returning its name.
    pub fn probe(&self) -> Result<String, DeviceError> {
        let device = self.find_device(&cpal::default_host())?;
        Ok(device.name().unwrap_or_else(|_| "<unnamed>".into()))
    }

    fn find_device(&self, host: &cpal::Host) -> Result<cpal::Device, DeviceError> {
        match &self.device_name {
            None => host
                .default_input_device()
                .ok_or_else(|| DeviceError::Unavailable(DEVICE.into())),
            Some(wanted) => host
                .input_devices()
                .map_err(|e| DeviceError::open(DEVICE, e))?
                .find(|d| d.name().ok().as_deref() == Some(wanted.as_str()))
                .ok_or_else(|| DeviceError::Unavailable(format!("{DEVICE} '{wanted}'"))),
        }
    }
}

impl CaptureDevice for CpalCapture {
    fn open_input(&self, format: &CaptureFormat) -> Result<Box<dyn InputStream>, DeviceError> {
        let host = cpal::default_host();
        let device = self.find_device(&host)?;

        let config = cpal::StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = mpsc::channel::<Vec<f32>>();
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Receiver gone means the session is closing.
                    let _ = tx.send(data.to_vec());
                },
                |err: cpal::StreamError| {
                    log::error!("cpal input stream error: {err}");
                },
                None,
            )
            .map_err(|e| DeviceError::open(DEVICE, e))?;
        stream.play().map_err(|e| DeviceError::open(DEVICE, e))?;

        log::debug!(
            "capture: opened {} Hz × {} ch, {} frames/chunk",
            format.sample_rate,
            format.channels,
            format.chunk_frames
        );

        Ok(Box::new(CpalInputStream {
            _stream: stream,
            rx,
            pending: Vec::new(),
            chunk_samples: format.chunk_samples().max(1),
            read_timeout: self.read_timeout,
        }))
    }
}

/// Keeps the cpal stream alive; dropping it stops the hardware stream.
struct CpalInputStream {
    _stream: cpal::Stream,
    rx: mpsc::Receiver<Vec<f32>>,
    pending: Vec<f32>,
    chunk_samples: usize,
    read_timeout: Duration,
}

impl InputStream for CpalInputStream {
    fn read_chunk(&mut self) -> Result<Vec<f32>, DeviceError> {
        while self.pending.len() < self.chunk_samples {
            match self.rx.recv_timeout(self.read_timeout) {
                Ok(buffer) => self.pending.extend_from_slice(&buffer),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(DeviceError::Timeout(DEVICE.into()));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(DeviceError::io(DEVICE, "stream closed"));
                }
            }
        }
        Ok(self.pending.drain(..self.chunk_samples).collect())
    }
}

// ---------------------------------------------------------------------------
// MockCapture (test only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::{MockCapture, MockCaptureStats};


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
