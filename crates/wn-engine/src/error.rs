//! Error types for engine operations.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while constructing or stepping an engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid model: {0}")]
    Model(#[from] wn_model::ValidationError),

    #[error("Invalid schedule: {0}")]
    Schedule(#[from] wn_core::CoreError),

    #[error("The network contains a cycle through node {node}")]
    Cycle { node: String },

    #[error("Infeasible on {timestamp}: node {node} received {delivered:.3} but requires {required:.3}")]
    Infeasible {
        timestamp: NaiveDate,
        node: String,
        delivered: f64,
        required: f64,
    },

    #[error("The run has already reached its end date ({end})")]
    Finished { end: NaiveDate },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
