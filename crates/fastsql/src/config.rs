//! Batch engine configuration

use serde::{Deserialize, Serialize};

use crate::error::{BatchError, Result};

/// Rows buffered per statement before an automatic flush
pub const DEFAULT_FLUSH_THRESHOLD: usize = 100;

/// Configuration for a [`crate::BatchEngine`]
///
/// Can be built in code or loaded from TOML:
///
/// ```toml
/// flush_threshold = 250
/// flush_on_close = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Rows per statement that trigger an automatic flush
    flush_threshold: usize,
    /// Whether `close` writes pending rows before disconnecting
    flush_on_close: bool,
    /// Most parameters one collapsed statement may bind; filled from the
    /// driver's capabilities when the engine opens through a registry
    max_parameters: Option<usize>,
}

impl BatchConfig {
    /// Create a configuration with the given flush threshold
    pub fn new(flush_threshold: usize) -> Self {
        Self {
            flush_threshold,
            flush_on_close: true,
            max_parameters: None,
        }
    }

    /// Parse a TOML document and validate it
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| BatchError::Configuration(format!("Invalid batch configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the flush threshold
    pub fn with_flush_threshold(mut self, flush_threshold: usize) -> Self {
        self.flush_threshold = flush_threshold;
        self
    }

    /// Set whether pending rows are flushed on close (default: true)
    ///
    /// When false, rows still buffered at close are discarded with a warning.
    pub fn with_flush_on_close(mut self, flush_on_close: bool) -> Self {
        self.flush_on_close = flush_on_close;
        self
    }

    /// Cap the parameters bound by one batch statement
    pub fn with_max_parameters(mut self, max_parameters: usize) -> Self {
        self.max_parameters = Some(max_parameters);
        self
    }

    /// Get the flush threshold
    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }

    /// Get whether pending rows are flushed on close
    pub fn flush_on_close(&self) -> bool {
        self.flush_on_close
    }

    /// Get the per-statement parameter limit, if any
    pub fn max_parameters(&self) -> Option<usize> {
        self.max_parameters
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(BatchError::Configuration(
                "flush_threshold must be greater than 0".to_string(),
            ));
        }
        if self.max_parameters == Some(0) {
            return Err(BatchError::Configuration(
                "max_parameters must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BatchConfig {
    /// Defaults:
    /// - flush_threshold: 100
    /// - flush_on_close: true
    /// - max_parameters: none
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_THRESHOLD)
    }
}
