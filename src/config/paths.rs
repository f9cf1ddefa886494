//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout (config dir holds `settings.toml` and the `scripts/` directory):
//!
//!   Windows: %APPDATA%\utterance-queue\
//!   macOS:   ~/Library/Application Support/utterance-queue/
//!   Linux:   ~/.config/utterance-queue/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and announcement scripts.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory searched for announcement scripts given by bare name.
    pub scripts_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "utterance-queue";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let scripts_dir = config_dir.join("scripts");

        Self {
            config_dir,
            settings_file,
            scripts_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
