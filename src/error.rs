//! Error types for the scanner
//!
//! Provides structured error types with contextual information for:
//! - User input errors (port specs, target expressions, flag conflicts)
//! - Network errors surfaced outside the per-port pipeline
//! - Output and rendering errors
//!
//! Per-port transient failures (timeouts, refusals, resets) are never
//! represented as errors; they fold into closed-port results.

use std::{io, net::AddrParseError, num::ParseIntError};
use thiserror::Error;

/// Main result type used throughout the library
pub type Result<T> = std::result::Result<T, ScannerError>;

#[derive(Error, Debug)]
pub enum ScannerError {
    /// Validation errors for user input
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Target specification and resolution errors
    #[error("invalid target: {target} - {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Network connectivity errors outside the scan pipeline
    #[error("network error: {message}")]
    Network { message: String },

    /// Timeout errors with contextual information
    #[error("timeout: {operation} after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    /// Output and rendering errors
    #[error("output error: {format} - {message}")]
    Output { format: String, message: String },

    /// File I/O errors
    #[error("io error: {operation} - {message}")]
    Io { operation: String, message: String },
}

impl ScannerError {
    /// Create a validation error
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invalid target error
    pub fn invalid_target<T: Into<String>, R: Into<String>>(target: T, reason: R) -> Self {
        Self::InvalidTarget {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a network error
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<O: Into<String>>(operation: O, millis: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            millis,
        }
    }

    /// Create an output error
    pub fn output<F: Into<String>, M: Into<String>>(format: F, message: M) -> Self {
        Self::Output {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Create an IO error
    pub fn io<O: Into<String>, M: Into<String>>(operation: O, message: M) -> Self {
        Self::Io {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Check if this error is a user input problem rather than a runtime failure
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::InvalidTarget { .. })
    }
}

impl From<io::Error> for ScannerError {
    fn from(error: io::Error) -> Self {
        Self::io("io operation", error.to_string())
    }
}

impl From<AddrParseError> for ScannerError {
    fn from(error: AddrParseError) -> Self {
        Self::invalid_target("ip address", error.to_string())
    }
}

impl From<ParseIntError> for ScannerError {
    fn from(error: ParseIntError) -> Self {
        Self::validation("number", error.to_string())
    }
}

impl From<serde_json::Error> for ScannerError {
    fn from(error: serde_json::Error) -> Self {
        Self::output("json", error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = ScannerError::validation("ports", "inverted range");
        assert!(matches!(error, ScannerError::Validation { .. }));
        assert!(error.is_user_error());
    }

    #[test]
    fn test_network_error_not_user_error() {
        let error = ScannerError::network("connection reset");
        assert!(!error.is_user_error());
    }

    #[test]
    fn test_error_display() {
        let error = ScannerError::timeout("smb helper", 10_000);
        assert_eq!(error.to_string(), "timeout: smb helper after 10000ms");
    }
}
