use chrono::NaiveDate;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("The start date ({start}) must be before the end date ({end})")]
    InvalidSchedule { start: NaiveDate, end: NaiveDate },
}
