//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON document could not be parsed or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An event line could not be parsed.
    #[error("line {line}: {source}")]
    InvalidEvent {
        /// 1-based line number in the input.
        line: usize,
        /// Parser error.
        source: serde_json::Error,
    },

    /// Unsupported output format.
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),
}
