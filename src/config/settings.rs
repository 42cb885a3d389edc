//! Installation settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` only
//! needs to name the values it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::audio::CaptureFormat;
use crate::hardware::EnvironmentReading;
use crate::light::Rgb;

// ---------------------------------------------------------------------------
// RecordingConfig
// ---------------------------------------------------------------------------

/// Capture settings for each ambient recording cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Length of one full cycle in seconds.
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames delivered per blocking read.
    pub chunk_frames: usize,
    /// Input device name; `None` means the system default.
    pub input_device: Option<String>,
    /// How long a single chunk read may block before the session errors.
    pub read_timeout_ms: u64,
    /// Where finished WAV files are staged before submission.  `None` uses
    /// the platform data directory.
    pub recordings_dir: Option<PathBuf>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            duration_secs: 300.0,
            sample_rate: 44_100,
            channels: 2,
            chunk_frames: 1_024,
            input_device: None,
            read_timeout_ms: 2_000,
            recordings_dir: None,
        }
    }
}

impl RecordingConfig {
    pub fn capture_format(&self) -> CaptureFormat {
        CaptureFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            chunk_frames: self.chunk_frames,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// OrchestratorConfig
// ---------------------------------------------------------------------------

/// Timing of the main control loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub tick_ms: u64,
    /// Upper bound on waiting for a cancelled recording to stop.
    pub join_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 200,
            join_timeout_ms: 1_500,
        }
    }
}

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// Remote job service connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL, without a trailing `/api/v1`.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Finished jobs nobody has played yet are dropped, oldest first, past
    /// this many tracked tasks.
    pub max_tracked_tasks: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            timeout_secs: 30,
            max_tracked_tasks: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// SwitchConfig
// ---------------------------------------------------------------------------

/// Visitor push-button.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    /// Keyboard key standing in for the button (e.g. `"Space"`).
    pub key: String,
    /// Presses closer together than this are ignored.
    pub debounce_ms: u64,
    /// Bounded queue between the button thread and the control loop.
    pub queue_capacity: usize,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            key: "Space".into(),
            debounce_ms: 300,
            queue_capacity: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// LightConfig
// ---------------------------------------------------------------------------

/// Amplitude-reactive LED.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Color shown for silence.
    pub min_color: Rgb,
    /// Color shown at the clip's peak loudness.
    pub max_color: Rgb,
    /// Audio covered by one color, in milliseconds.
    pub chunk_ms: u64,
    pub gain: f32,
    /// How often the LED is refreshed during playback.
    pub tick_ms: u64,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            min_color: Rgb::BLACK,
            max_color: Rgb::new(0.2, 0.6, 1.0),
            chunk_ms: 10,
            gain: 5.0,
            tick_ms: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// MotionConfig
// ---------------------------------------------------------------------------

/// Beat-synchronised "breathing" motion played alongside audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub bpm: f64,
    /// Beats covered by one breathing profile.
    pub beats_per_profile: u32,
    pub low_angle: f64,
    pub high_angle: f64,
    /// Fraction of each breath spent rising (0 < f < 1).
    pub rise_fraction: f64,
    /// Control-loop rate for every actuator.
    pub tick_hz: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats_per_profile: 16,
            low_angle: -60.0,
            high_angle: 60.0,
            rise_fraction: 0.3,
            tick_hz: 200.0,
        }
    }
}

// ---------------------------------------------------------------------------
// ActuatorConfig
// ---------------------------------------------------------------------------

/// Which motion an actuator performs during playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorRole {
    /// Follows the breathing profile.
    Vertical,
    /// Holds its rest angle.
    Horizontal,
}

/// One servo channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorConfig {
    pub name: String,
    pub role: ActuatorRole,
    pub min_angle: f64,
    pub max_angle: f64,
    pub rest_angle: f64,
    /// Degrees per second.
    pub speed_limit: f64,
}

impl ActuatorConfig {
    fn servo(name: &str, role: ActuatorRole) -> Self {
        Self {
            name: name.into(),
            role,
            min_angle: -90.0,
            max_angle: 90.0,
            rest_angle: 0.0,
            speed_limit: 360.0,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use jellyfish::config::AppConfig;
///
/// // Load (returns Default when the file is missing)
/// let config = AppConfig::load().unwrap();
/// assert!(config.recording.duration_secs > 0.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub recording: RecordingConfig,
    pub orchestrator: OrchestratorConfig,
    pub api: ApiConfig,
    pub switch: SwitchConfig,
    pub light: LightConfig,
    pub motion: MotionConfig,
    /// Readings submitted by the simulated sensor.
    pub sensors: EnvironmentReading,
    pub actuators: Vec<ActuatorConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            recording: RecordingConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            api: ApiConfig::default(),
            switch: SwitchConfig::default(),
            light: LightConfig::default(),
            motion: MotionConfig::default(),
            sensors: EnvironmentReading::default(),
            actuators: vec![
                ActuatorConfig::servo("servo-12", ActuatorRole::Vertical),
                ActuatorConfig::servo("servo-13", ActuatorRole::Horizontal),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory for staged recordings: the configured override or the
    /// platform default from `paths`.
    pub fn recordings_dir(&self, paths: &AppPaths) -> PathBuf {
        self.recording
            .recordings_dir
            .clone()
            .unwrap_or_else(|| paths.recordings_dir.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
