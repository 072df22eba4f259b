//! Engine settings.

use std::path::Path;

use rivulet_core::{ContextOptions, DEFAULT_PADDING_FACTOR, DEFAULT_RAMP_SECONDS};
use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::validation::{ValidationError, ValidationResult, check_all, check_range};

/// Settings used to build a rivulet [`Context`](rivulet_core::Context).
///
/// Every field has a default, so a settings file only lists what it changes:
///
/// ```rust
/// use rivulet_config::EngineConfig;
///
/// let config = EngineConfig::from_toml_str("frames_per_block = 128").unwrap();
/// assert_eq!(config.frames_per_block, 128);
/// assert_eq!(config.sample_rate, 44100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frames rendered per block.
    pub frames_per_block: usize,
    /// Blocks of headroom in ring buffers created by the context.
    pub ring_padding_factor: usize,
    /// Default parameter ramp length in seconds.
    pub default_ramp_seconds: f64,
    /// Output channel count.
    pub output_channels: usize,
    /// Input channel count; zero disables capture.
    pub input_channels: usize,
    /// Device to open by name; the host default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let options = ContextOptions::default();
        Self {
            sample_rate: options.sample_rate,
            frames_per_block: options.frames_per_block,
            ring_padding_factor: DEFAULT_PADDING_FACTOR,
            default_ramp_seconds: DEFAULT_RAMP_SECONDS,
            output_channels: options.output_channels,
            input_channels: 0,
            device_name: None,
        }
    }
}

impl EngineConfig {
    /// Load and validate settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` when it exists, otherwise return the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate settings from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the settings to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Serialize the settings to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks every setting, reporting all failures at once.
    pub fn validate(&self) -> ValidationResult<()> {
        check_all([
            check_range("sample_rate", f64::from(self.sample_rate), 8000.0, 384_000.0),
            check_range("frames_per_block", self.frames_per_block as f64, 16.0, 8192.0),
            check_range("ring_padding_factor", self.ring_padding_factor as f64, 1.0, 64.0),
            check_range("default_ramp_seconds", self.default_ramp_seconds, 0.0, 10.0),
            check_range("output_channels", self.output_channels as f64, 1.0, 32.0),
            check_range("input_channels", self.input_channels as f64, 0.0, 32.0),
            self.check_device_name(),
        ])
    }

    fn check_device_name(&self) -> ValidationResult<()> {
        match &self.device_name {
            Some(name) if name.trim().is_empty() => Err(ValidationError::InvalidFormat {
                param: "device_name".to_string(),
                reason: "must not be blank; omit it to use the default device".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Options for a device-less [`Context`](rivulet_core::Context).
    ///
    /// With a device attached, the device's own rate, block size, and channel
    /// count take precedence; the ramp and padding settings still apply.
    pub fn into_context_options(self) -> ContextOptions {
        ContextOptions {
            sample_rate: self.sample_rate,
            frames_per_block: self.frames_per_block,
            output_channels: self.output_channels,
            default_ramp_seconds: self.default_ramp_seconds,
            ring_padding_factor: self.ring_padding_factor,
        }
    }
}
