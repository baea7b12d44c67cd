//! Messages exchanged between the run controller and the worker thread.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use wn_core::Timestepper;
use wn_engine::StepSnapshot;

use crate::error::{RunError, RunResult};

/// How far a run advances before it pauses or closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Advance exactly one timestep then pause.
    Step,
    /// Advance to the end date, then close the session.
    Run,
    /// Advance to the given timestep then pause.
    RunToDate(NaiveDate),
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Step => f.write_str("step"),
            RunMode::Run => f.write_str("run"),
            RunMode::RunToDate(target) => write!(f, "run to {}", target),
        }
    }
}

impl RunMode {
    /// Check that the mode can advance a session whose last completed
    /// timestep is `current` (`None` before the first timestep).
    pub fn validate(
        &self,
        current: Option<NaiveDate>,
        timestepper: &Timestepper,
    ) -> RunResult<()> {
        if current.is_some_and(|c| c >= timestepper.last_timestamp()) {
            return Err(RunError::EndDateReached {
                end: timestepper.last_timestamp(),
            });
        }
        let RunMode::RunToDate(target) = *self else {
            return Ok(());
        };
        if !timestepper.contains(target) {
            return Err(RunError::InvalidTarget {
                target,
                reason: format!(
                    "the date must be a timestep between {} and {}",
                    timestepper.start(),
                    timestepper.last_timestamp()
                ),
            });
        }
        match current {
            Some(current) if target <= current => Err(RunError::InvalidTarget {
                target,
                reason: format!("the date must be after the current timestep ({})", current),
            }),
            None if target <= timestepper.start() => Err(RunError::InvalidTarget {
                target,
                reason: format!(
                    "the date must be after the start date ({})",
                    timestepper.start()
                ),
            }),
            _ => Ok(()),
        }
    }
}

/// Commands sent to the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Advance(RunMode),
    Pause,
    Kill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunProgress {
    pub timestamp: NaiveDate,
    pub current_index: usize,
    pub last_index: usize,
}

impl RunProgress {
    /// Fraction of the run completed, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.last_index == 0 {
            return 1.0;
        }
        (self.current_index as f64 / self.last_index as f64).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FinishReason {
    StoppedByUser,
    ReachedEndDate,
    Error(RunError),
}

/// Notifications emitted by the worker, delivered in emission order.
///
/// For one timestep the order is `BeforeStep`, `StepDone`, `Progress`, then
/// `Paused` if the session suspends there. `Finished` is the last message of
/// a session.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Status(String),
    BeforeStep {
        timestamp: NaiveDate,
    },
    StepDone {
        timestamp: NaiveDate,
        snapshot: Arc<StepSnapshot>,
    },
    Progress(RunProgress),
    /// The session suspended after `timestamp` (`None` if paused before its first timestep).
    Paused {
        timestamp: Option<NaiveDate>,
        at_end: bool,
    },
    Finished(FinishReason),
}

impl WorkerEvent {
    pub fn is_finished(&self) -> bool {
        matches!(self, WorkerEvent::Finished(_))
    }
}
