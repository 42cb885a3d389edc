//! Configuration for the installation.
//!
//! Provides `AppConfig` (top-level settings), one sub-config per subsystem,
//! `AppPaths` for cross-platform directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    ActuatorConfig, ActuatorRole, ApiConfig, AppConfig, LightConfig, MotionConfig,
    OrchestratorConfig, RecordingConfig, SwitchConfig,
};
