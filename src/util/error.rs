//! Error types for the shadow pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for mesh loading and rendering.
#[derive(Error, Debug)]
pub enum Error {
    /// Surface file could not be opened
    #[error("Failed to open {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Line starts with a token that is not a known record type
    #[error("Unknown record type \"{token}\" at line {line}")]
    UnknownRecord { line: usize, token: String },

    /// Known record with missing or unparsable fields
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Face refers to a vertex that does not exist
    #[error("Vertex index {index} out of range at line {line} (count: {count})")]
    IndexOutOfRange { line: usize, index: i64, count: usize },

    /// Image encode/decode failure (debug dumps, saved frames)
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// GPU device, shader or readback failure
    #[error("GPU error: {0}")]
    Gpu(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a GPU error.
    pub fn gpu(msg: impl Into<String>) -> Self {
        Self::Gpu(msg.into())
    }
}

/// Result type alias for shadow pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
