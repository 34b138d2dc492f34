//! Logging configuration
//!
//! Controls how the `rill` binary installs its tracing subscriber.
//! The library crates only emit events; they never install a subscriber.

use std::fmt;

use serde::Deserialize;

/// Crates whose events follow the configured level
const RILL_TARGETS: [&str; 3] = ["rill", "rill_pipeline", "rill_config"];

/// Verbosity of rill's own events
///
/// `debug` shows every chain start and early stage stop, `trace` adds the
/// per-stage lifecycle.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive name understood by `EnvFilter`
    pub fn name(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where log events are rendered for humans or collectors
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact lines with target
    #[default]
    Console,
    /// One JSON object per event
    Json,
}

/// Logging configuration
///
/// Logs always go to stderr so command output on stdout stays machine-readable.
///
/// # Example
///
/// ```toml
/// [log]
/// level = "debug"
/// format = "json"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for the rill crates; other crates stay at `warn` or quieter
    /// Default: info
    pub level: LogLevel,

    /// Output format (console, json)
    /// Default: console
    pub format: LogFormat,
}

impl LogConfig {
    /// Filter directive for `EnvFilter`
    ///
    /// The configured level applies to the rill crates only, so a `trace`
    /// run does not also flood stderr with runtime internals.
    pub fn filter_directive(&self) -> String {
        let others = self.level.min(LogLevel::Warn);
        let mut directive = others.name().to_string();
        for target in RILL_TARGETS {
            directive.push_str(&format!(",{target}={}", self.level));
        }
        directive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Console);
    }

    #[test]
    fn test_deserialize_empty() {
        let config: LogConfig = toml::from_str("").unwrap();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Console);
    }

    #[test]
    fn test_deserialize_full() {
        let config: LogConfig = toml::from_str("level = \"trace\"\nformat = \"json\"").unwrap();
        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_level_names_round_trip_through_toml() {
        for level in [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ] {
            let config: LogConfig = toml::from_str(&format!("level = \"{level}\"")).unwrap();
            assert_eq!(config.level, level);
        }
    }

    #[test]
    fn test_unknown_level_rejected() {
        let result: Result<LogConfig, _> = toml::from_str("level = \"verbose\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_filter_directive_scopes_level_to_rill() {
        let config: LogConfig = toml::from_str("level = \"debug\"").unwrap();
        assert_eq!(
            config.filter_directive(),
            "warn,rill=debug,rill_pipeline=debug,rill_config=debug"
        );

        let config: LogConfig = toml::from_str("level = \"error\"").unwrap();
        assert_eq!(
            config.filter_directive(),
            "error,rill=error,rill_pipeline=error,rill_config=error"
        );
    }
}
