//! Configuration module
//!
//! Everything is optional; a missing file or section falls back to the
//! markers printed by the JANA `Parsef250Bank` exception handler.
//!
//! # Example
//! ```ignore
//! let config = Config::load("pulsedata.toml")?;
//! let scanner = LogScanner::new(config.scanner.clone());
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::reader::decoder::DecoderConfig;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub listing: ListingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let markers = [
            ("scanner.trigger_phrase", &self.scanner.trigger_phrase),
            ("scanner.resend_marker", &self.scanner.resend_marker),
            ("scanner.completion_marker", &self.scanner.completion_marker),
        ];
        for (field, value) in markers {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "marker must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Scanner Configuration
// =============================================================================

/// Log markers recognized by the scanner
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Substring that opens a defective-block report
    pub trigger_phrase: String,

    /// Line echoed to the listing when the trigger phrase is seen
    pub trigger_banner: String,

    /// Substring announcing that the dump is printed again
    pub resend_marker: String,

    /// Substring that ends the dump table
    pub completion_marker: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            trigger_phrase: "Bad f250 Pulse Data ".to_string(),
            trigger_banner: "Bad f250 Pulse Data:".to_string(),
            resend_marker: "JANA ERROR>>Now let's REALLY print something!!!".to_string(),
            completion_marker: "JANA ERROR".to_string(),
        }
    }
}

// =============================================================================
// Listing Configuration
// =============================================================================

/// Output rendering options
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListingConfig {
    /// Collapse runs of identical lines into one line plus a repeat count
    pub coalesce_repeats: bool,

    /// Spaces per nesting level
    pub indent_width: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            coalesce_repeats: true,
            indent_width: 2,
        }
    }
}
