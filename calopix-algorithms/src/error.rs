//! Error types for the analysis tasks.

use thiserror::Error;

/// Result type alias for task operations.
pub type Result<T> = std::result::Result<T, ClusterizeError>;

/// Errors raised while running the analysis tasks.
#[derive(Error, Debug)]
pub enum ClusterizeError {
    /// No calibration is available for the run.
    #[error("no calibration available for run {run}")]
    MissingCalibration { run: i32 },

    /// No pedestal / dead-channel map is available for the run.
    #[error("no dead channel map available for run {run}")]
    MissingDeadMap { run: i32 },

    /// Error from the data model.
    #[error(transparent)]
    Core(#[from] calopix_core::Error),
}
