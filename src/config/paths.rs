//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (`settings.toml`):
//!   Linux:   ~/.config/jellyfish/
//!   macOS:   ~/Library/Application Support/jellyfish/
//!
//! Data dir (staged recordings):
//!   Linux:   ~/.local/share/jellyfish/recordings/
//!   macOS:   ~/Library/Application Support/jellyfish/recordings/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Finished cycle recordings waiting to be submitted.
    pub recordings_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "jellyfish";

    /// Resolves all paths, falling back to the current directory when the
    /// platform has no standard location.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            recordings_dir: data_dir.join("recordings"),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .recordings_dir
            .file_name()
            .is_some_and(|n| n == "recordings"));
    }
}
