//! Core error types for WIPECERT.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Document is not a non-empty, well-formed mapping
    InvalidDocument { reason: String },

    /// Invalid certificate ID
    InvalidId { reason: String },

    /// Invalid digest format
    InvalidDigest { reason: String },

    /// Value could not be encoded
    Encoding { reason: String },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDocument { reason } => write!(f, "Invalid document: {}", reason),
            Self::InvalidId { reason } => write!(f, "Invalid certificate ID: {}", reason),
            Self::InvalidDigest { reason } => write!(f, "Invalid digest: {}", reason),
            Self::Encoding { reason } => write!(f, "Encoding failed: {}", reason),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding {
            reason: err.to_string(),
        }
    }
}
