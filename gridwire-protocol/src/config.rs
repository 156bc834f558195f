//! Protocol configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via GRIDWIRE_CONFIG)
//! 3. Environment variables

use crate::fragment::FRAGMENT_HEADER_OVERHEAD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Protocol configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame-level limits.
    pub wire: WireConfig,
    /// Fragmentation and reassembly limits.
    pub fragmentation: FragmentationConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("GRIDWIRE_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        self.wire.apply_env_overrides(&var);
        self.fragmentation.apply_env_overrides(&var);
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.wire.validate()?;
        self.fragmentation.validate()
    }
}

fn parse_override<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(value) = var(key) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!("Ignoring {}: cannot parse '{}'", key, value),
        }
    }
}

/// Frame-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// Largest frame content accepted from the wire, in bytes.
    pub max_frame_size: u32,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_frame_size: crate::MAX_FRAME_SIZE,
        }
    }
}

impl WireConfig {
    fn apply_env_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        parse_override(var, "GRIDWIRE_MAX_FRAME_SIZE", &mut self.max_frame_size);
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_size == 0 {
            return Err(ConfigError::ValidationError(
                "wire.max_frame_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fragmentation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentationConfig {
    /// Messages larger than this many wire bytes are fragmented.
    pub max_fragment_size: usize,
    /// Largest reassembled message accepted, in wire bytes.
    pub max_message_size: usize,
    /// Maximum in-flight assemblies per connection.
    pub max_pending: usize,
    /// Partial messages older than this are discarded.
    pub assembly_timeout_secs: u64,
}

impl Default for FragmentationConfig {
    fn default() -> Self {
        Self {
            max_fragment_size: 128 * 1024,
            max_message_size: 64 * 1024 * 1024,
            max_pending: 64,
            assembly_timeout_secs: 30,
        }
    }
}

impl FragmentationConfig {
    fn apply_env_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        parse_override(var, "GRIDWIRE_MAX_FRAGMENT_SIZE", &mut self.max_fragment_size);
        parse_override(var, "GRIDWIRE_MAX_MESSAGE_SIZE", &mut self.max_message_size);
        parse_override(var, "GRIDWIRE_MAX_PENDING_ASSEMBLIES", &mut self.max_pending);
        parse_override(
            var,
            "GRIDWIRE_ASSEMBLY_TIMEOUT",
            &mut self.assembly_timeout_secs,
        );
    }

    /// Returns the assembly timeout as Duration.
    pub fn assembly_timeout(&self) -> Duration {
        Duration::from_secs(self.assembly_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_fragment_size <= FRAGMENT_HEADER_OVERHEAD {
            return Err(ConfigError::ValidationError(format!(
                "fragmentation.max_fragment_size must exceed the {} byte fragment header",
                FRAGMENT_HEADER_OVERHEAD
            )));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::ValidationError(
                "fragmentation.max_message_size must be greater than zero".to_string(),
            ));
        }
        if self.max_pending == 0 {
            return Err(ConfigError::ValidationError(
                "fragmentation.max_pending must be greater than zero".to_string(),
            ));
        }
        if self.assembly_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "fragmentation.assembly_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
