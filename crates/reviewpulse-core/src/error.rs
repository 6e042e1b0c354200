use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("month must be in 1..=12, got {0}")]
    InvalidMonth(u32),

    #[error("unknown sentiment label: {0:?}")]
    UnknownLabel(String),

    #[error("month {month} does not match date {date}")]
    InconsistentMonth { date: NaiveDate, month: u32 },

    #[error("confidence must be in [0, 1], got {0}")]
    InvalidConfidence(f32),

    #[error("review body is empty")]
    EmptyBody,

    #[error("invalid configuration: {0}")]
    Config(String),
}
