//! Error type for the local persistence layer.
//!
//! The remote seams (gateway, invitation service) speak `anyhow::Result`
//! and their failures are logged and absorbed where they occur; this
//! error covers the draft store's own file and serialization failures.

use std::fmt;

#[derive(Debug, Clone)]
pub enum AppError {
    /// Serialization errors (unexpected value shapes)
    Serialization(String),

    /// I/O errors (file read/write, permissions)
    Io(String),
}

impl AppError {
    /// Create a serialization error with a message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an I/O error with a message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Convert from `std::io::Error` to `AppError`.
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::io(err.to_string())
    }
}

/// Convert from `serde_json::Error` to `AppError`.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::serialization(format!("JSON error: {}", err))
    }
}

/// Type alias for Result with AppError.
pub type Result<T> = std::result::Result<T, AppError>;
