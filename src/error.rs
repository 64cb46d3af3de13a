//! Global error handling for codeshare
//!
//! This module provides a centralized error type covering every stage of the
//! export/import pipeline. Errors fall into two groups: fatal ones abort the
//! whole operation, per-item ones are logged and counted as skips.

use std::io;
use thiserror::Error;

/// Global error type for codeshare operations
#[derive(Error, Debug)]
pub enum CodeShareError {
    /// Missing or invalid directory/file arguments
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown profile name
    #[error("Not found: {0}")]
    NotFound(String),

    /// The catalog has no active profile
    #[error("No active profile is set")]
    NoActiveProfile,

    /// Profile definition violates its invariants
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    /// Traversal attempt, rooted path or write target outside the project root
    #[error("Path safety violation: {0}")]
    PathSafety(String),

    /// File system errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed or mismatched markers
    #[error("Format error: {0}")]
    Format(String),

    /// Input too large to buffer
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// JSON processing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodeShareError {
    /// Whether this error aborts the whole operation rather than a single file or block
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::PathSafety(_) | Self::Io(_) | Self::Format(_)
        )
    }
}

/// Specialized Result type for codeshare operations
pub type Result<T> = std::result::Result<T, CodeShareError>;

/// Creates a CodeShareError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::CodeShareError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}

// Lets the binary keep an io::Result main
impl From<CodeShareError> for io::Error {
    fn from(err: CodeShareError) -> Self {
        let kind = match &err {
            CodeShareError::Io(e) => e.kind(),
            CodeShareError::NotFound(_) | CodeShareError::NoActiveProfile => {
                io::ErrorKind::NotFound
            }
            CodeShareError::Validation(_) | CodeShareError::InvalidProfile(_) => {
                io::ErrorKind::InvalidInput
            }
            CodeShareError::PathSafety(_) => io::ErrorKind::PermissionDenied,
            CodeShareError::Format(_) | CodeShareError::Json(_) => io::ErrorKind::InvalidData,
            CodeShareError::ResourceExhausted(_) => io::ErrorKind::OutOfMemory,
        };
        io::Error::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked(flag: bool) -> Result<()> {
        ensure!(flag, Validation, "flag was {}", flag);
        Ok(())
    }

    #[test]
    fn test_ensure_macro() {
        assert!(checked(true).is_ok());
        let err = checked(false).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: flag was false");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(CodeShareError::NoActiveProfile.is_fatal());
        assert!(error!(Validation, "x").is_fatal());
        assert!(error!(ResourceExhausted, "x").is_fatal());
        assert!(!error!(PathSafety, "x").is_fatal());
        assert!(!error!(Format, "x").is_fatal());
        assert!(!CodeShareError::Io(io::Error::new(io::ErrorKind::Other, "x")).is_fatal());
    }

    #[test]
    fn test_into_io_error_kind() {
        let io_err: io::Error = error!(NotFound, "profile 'Rust'").into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
        assert!(io_err.to_string().contains("Rust"));
    }
}
