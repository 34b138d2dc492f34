//! Rill Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! An empty file is a valid configuration - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use rill_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[pipeline]\nchannel_capacity = 4").unwrap();
//! assert_eq!(config.pipeline.channel_capacity, 4);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [pipeline]
//! channel_capacity = 1
//! source_capacity = 16
//!
//! [log]
//! level = "info"
//! format = "console"
//! ```

mod error;
mod logging;
mod pipeline;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use pipeline::PipelineConfig;

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Channel sizing for processors and sources
    pub pipeline: PipelineConfig,

    /// Logging configuration
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.pipeline.validate()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.pipeline.channel_capacity, 1);
        assert_eq!(config.log.level, LogLevel::Info);
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[pipeline]
channel_capacity = 8
source_capacity = 64

[log]
level = "debug"
format = "json"
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.pipeline.channel_capacity, 8);
        assert_eq!(config.pipeline.source_capacity, 64);
        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_str("invalid { toml");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let result = Config::from_str("[pipeline]\nchannel_capacity = 0");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pipeline]\nsource_capacity = 2").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.pipeline.source_capacity, 2);
    }

    #[test]
    fn test_from_missing_file() {
        let err = Config::from_file("/nonexistent/rill.toml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
        assert!(err.to_string().contains("/nonexistent/rill.toml"));
    }
}
