//! Pipeline configuration
//!
//! Channel sizing shared by every processor built from this config.

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Pipeline configuration
///
/// All fields have sensible defaults - you only need to specify what you want to change.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of every channel between two stages
    /// Default: 1 (a stage is offered one chunk at a time)
    pub channel_capacity: usize,

    /// Capacity of push-source channels
    /// Default: 16
    pub source_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1,
            source_capacity: 16,
        }
    }
}

impl PipelineConfig {
    /// Set the inter-stage channel capacity
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the push-source channel capacity
    pub fn with_source_capacity(mut self, capacity: usize) -> Self {
        self.source_capacity = capacity;
        self
    }

    /// Validate channel sizes
    ///
    /// Tokio bounded channels require a capacity of at least one.
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "pipeline",
                "channel_capacity",
                "must be at least 1",
            ));
        }
        if self.source_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "pipeline",
                "source_capacity",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
