//! Error types for the simulation engine

use thiserror::Error;

/// Simulation result type
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Errors raised while configuring a simulation.
///
/// Running a simulation never fails: deadline misses and idle ticks are
/// reported as data, not as errors.
#[derive(Error, Debug)]
pub enum SimulationError {
    /// Task parameters outside the supported model
    #[error("Invalid task {index}: {reason}")]
    InvalidTask { index: usize, reason: String },

    /// Unrecognised policy name
    #[error("Unknown scheduling policy: {0}")]
    UnknownPolicy(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimulationError {
    /// Create an invalid task error
    pub fn invalid_task(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidTask {
            index,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
