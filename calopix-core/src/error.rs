//! Error types for calopix-core.

use thiserror::Error;

/// Result type alias for calopix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for calopix operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Cell id outside the configured detector geometry.
    #[error("invalid cell id: {0}")]
    InvalidCellId(u16),

    /// Position outside of a collection.
    #[error("index {index} out of range for collection of {len} elements")]
    IndexOutOfRange { index: usize, len: usize },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Event is missing a required component.
    #[error("event {run}: missing {what}")]
    MissingEventData { run: i32, what: &'static str },
}
