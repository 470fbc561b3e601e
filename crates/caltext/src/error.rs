//! Error types for caltext operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaltextError {
    #[error("Could not parse date: {0}")]
    DateParse(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid RRULE: {0}")]
    InvalidRule(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("Malformed table: {0}")]
    MalformedTable(String),
}

pub type Result<T> = std::result::Result<T, CaltextError>;
