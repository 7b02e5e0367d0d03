//! Typed domain errors shared by the schedule, check-in, attendance and leave
//! modules.
//!
//! Every fallible operation in this crate returns `Result<_, DomainError>`.
//! Database failures that are not a constraint race surface as
//! `ServiceUnavailable` and are the only retryable variant; all other variants
//! are domain outcomes that will not change without different input.

use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("an occurrence already exists on that date")]
    Conflict,

    #[error("{0} is not a meeting day for this course")]
    InvalidWeekday(String),

    #[error("no cancellation exists on the related date")]
    NotCancelled,

    #[error("that cancellation already has a makeup class")]
    AlreadyLinked,

    #[error("a makeup class is linked to this cancellation")]
    HasDependentMakeup,

    #[error("attendance records already reference this occurrence")]
    HasAttendanceRecords,

    #[error("check-in token has expired")]
    Expired,

    #[error("class is cancelled on that date")]
    ClassCancelled,

    #[error("no class is scheduled on that date")]
    NotScheduled,

    #[error("attendance already recorded for this occurrence")]
    AlreadyCheckedIn,

    #[error("record status does not require justification")]
    NotJustifiable,

    #[error("leave request can no longer be modified")]
    Immutable,

    #[error("leave request has already been decided")]
    AlreadyDecided,

    #[error("invalid decision")]
    InvalidDecision,

    #[error("end date is before start date")]
    InvalidRange,

    #[error("illegal state transition from {from} to {to}")]
    StateViolation { from: String, to: String },

    #[error("not allowed to perform this operation")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    ServiceUnavailable(#[from] DbErr),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    /// True only for transient infrastructure failures; domain outcomes are
    /// final for the given input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::ServiceUnavailable(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
