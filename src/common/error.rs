//! Error types
//!
//! Only two conditions are errors at all: failing to read input or write the
//! listing, and a log whose dump header is missing after the trigger phrase.
//! Malformed words never produce an `Err`; the decoder reports them inline.

use thiserror::Error;

use crate::config::ConfigError;

/// Unrecoverable log scanner failures
#[derive(Error, Debug)]
pub enum ScanError {
    /// The line after the trigger phrase is not a `Dumping binary:` header
    #[error("Parse error -- missing 'Dumping binary' line in log at line {line_no}: {line}")]
    MissingDumpHeader { line_no: usize, line: String },
}

/// Top-level error for a listing run
#[derive(Error, Debug)]
pub enum PulseDataError {
    /// Log format not as expected; the run cannot continue
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error reading the log or writing the listing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PulseDataError {
    /// Whether this error comes from the log contents rather than the environment
    pub fn is_fatal_scan(&self) -> bool {
        matches!(self, Self::Scan(_))
    }
}

/// Result type alias using PulseDataError
pub type PulseDataResult<T> = Result<T, PulseDataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_header_message() {
        let err = ScanError::MissingDumpHeader {
            line_no: 12,
            line: "something else".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("missing 'Dumping binary' line"));
        assert!(msg.contains("line 12"));
        assert!(msg.contains("something else"));
    }

    #[test]
    fn test_scan_error_is_fatal() {
        let err: PulseDataError = ScanError::MissingDumpHeader {
            line_no: 1,
            line: String::new(),
        }
        .into();
        assert!(err.is_fatal_scan());
        assert!(err.to_string().contains("Parse error"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PulseDataError = io_err.into();
        assert!(!err.is_fatal_scan());
        assert!(err.to_string().contains("I/O error"));
    }
}
