//! Error types for run control.

use chrono::NaiveDate;

/// Errors raised by run commands, either synchronously when a command is
/// rejected or asynchronously through `FinishReason::Error`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunError {
    #[error("A model run is already in progress")]
    AlreadyRunning,

    #[error("Cannot run to {target}: {reason}")]
    InvalidTarget { target: NaiveDate, reason: String },

    #[error("The run has already reached its end date ({end})")]
    EndDateReached { end: NaiveDate },

    #[error("No model run is in progress")]
    NotRunning,

    #[error("Cannot run the model: {message}")]
    InvalidSchedule { message: String },

    #[error("The model failed to load: {message}")]
    EngineConstruction { message: String },

    #[error("The model failed to run{}: {message}", at_timestamp(.timestamp))]
    EngineStep {
        timestamp: Option<NaiveDate>,
        message: String,
    },

    #[error("The run worker stopped unexpectedly")]
    WorkerDisconnected,

    #[error("Failed to start the run worker: {message}")]
    Spawn { message: String },
}

fn at_timestamp(timestamp: &Option<NaiveDate>) -> String {
    timestamp
        .map(|t| format!(" on {}", t.format("%d/%m/%Y")))
        .unwrap_or_default()
}

impl RunError {
    /// Whether the error was reported by the engine rather than by command validation.
    pub fn is_engine_error(&self) -> bool {
        matches!(
            self,
            RunError::EngineConstruction { .. } | RunError::EngineStep { .. }
        )
    }
}

/// Result type for run-control operations.
pub type RunResult<T> = Result<T, RunError>;

impl From<wn_core::CoreError> for RunError {
    fn from(err: wn_core::CoreError) -> Self {
        RunError::InvalidSchedule {
            message: err.to_string(),
        }
    }
}
