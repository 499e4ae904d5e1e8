//! Error types for policy management

use thiserror::Error;

/// Errors raised when a policy is created or enabled.
///
/// Matching itself never fails; everything here is caught at configuration
/// time.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(String),

    /// Invalid field value
    #[error("invalid value for field '{field}': {message}")]
    InvalidFieldValue { field: String, message: String },

    /// A policy with this name already exists
    #[error("policy already exists: {0}")]
    DuplicateName(String),

    /// Another policy already holds this line number
    #[error("line number {line_number} already used by policy '{holder}'")]
    DuplicateLineNumber { line_number: u32, holder: String },

    /// Policy not found
    #[error("policy not found: {0}")]
    NotFound(String),
}

/// Result type for policy operations
pub type Result<T> = std::result::Result<T, PolicyError>;
