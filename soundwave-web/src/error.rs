//! Error types for soundwave-web
//!
//! Only setup paths return errors. Per-subscriber delivery failures are
//! counted and logged by the broadcaster, never propagated.

use thiserror::Error;

/// Main error type for soundwave-web
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input device errors (enumeration, configuration, stream start)
    #[error("Audio capture error: {0}")]
    Capture(String),

    /// WAV file source errors
    #[error("Audio file error: {0}")]
    File(#[from] hound::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] soundwave_common::Error),
}

/// Convenience Result type using soundwave-web Error
pub type Result<T> = std::result::Result<T, Error>;
