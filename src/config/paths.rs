//! Cross-platform settings location using the `dirs` crate.
//!
//!   Windows: %APPDATA%\live-meter\settings.toml
//!   macOS:   ~/Library/Application Support/live-meter/settings.toml
//!   Linux:   ~/.config/live-meter/settings.toml

use std::path::PathBuf;

/// Resolved configuration paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "live-meter";

    /// Falls back to the current directory if the platform has no config dir.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);
        let settings_file = config_dir.join("settings.toml");

        Self {
            config_dir,
            settings_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
