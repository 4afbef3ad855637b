//! Error types for CleanBites.
//!
//! A missing record is not an error: lookups return `Option`. Everything that
//! reaches a caller as `Err` falls into one of the variants below.

use std::time::Duration;

use thiserror::Error;

/// Library-wide error type.
#[derive(Error, Debug)]
pub enum CleanBitesError {
    /// Caller input is missing a required field or is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Stored bytes are not valid JSON for the requested type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The completion service returned text that is not valid JSON.
    #[error("Response format error: {0}")]
    ResponseFormat(String),

    /// A record's embedded identifier disagrees with the addressed one.
    #[error("Identifier mismatch: expected '{expected}', record has '{found}'")]
    Mismatch { expected: String, found: String },

    /// Underlying storage failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The completion or extraction service failed.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The completion call did not finish in time.
    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CleanBitesError>;
