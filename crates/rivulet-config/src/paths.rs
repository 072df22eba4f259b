//! Platform-specific location of the engine settings file.
//!
//! - Linux: `~/.config/rivulet/engine.toml`
//! - macOS: `~/Library/Application Support/rivulet/engine.toml`
//! - Windows: `%APPDATA%\rivulet\engine.toml`

use std::path::PathBuf;

use crate::ConfigError;

/// Application name used for directory paths.
const APP_NAME: &str = "rivulet";

/// File name of the engine settings.
pub const ENGINE_FILE: &str = "engine.toml";

/// Returns the user-specific configuration directory.
///
/// Falls back to the current directory if the platform directory cannot be
/// determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path of the user's engine settings file.
pub fn default_engine_path() -> PathBuf {
    user_config_dir().join(ENGINE_FILE)
}

/// Creates the user configuration directory if needed and returns it.
pub fn ensure_user_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = user_config_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::create_dir(&dir, e))?;
    }
    Ok(dir)
}
