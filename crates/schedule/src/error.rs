//! Errors raised while building or evaluating a schedule.

use std::time::Duration;

/// A schedule that cannot be evaluated. Fatal for the check, never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidScheduleError {
    #[error("schedule has no active variant (set one of every, weekdays, bankingDays)")]
    NoVariant,

    #[error("schedule sets more than one of every, weekdays, bankingDays")]
    MultipleVariants,

    #[error("schedule has no times")]
    EmptySlots,

    #[error("interval period must be greater than zero")]
    NonPositivePeriod,

    #[error("invalid period '{0}'")]
    InvalidPeriod(String),

    #[error("invalid clock time '{0}' (expected HH:MM)")]
    InvalidClockTime(String),

    #[error("invalid tolerance '{0}'")]
    InvalidTolerance(String),

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("unknown holiday calendar '{0}'")]
    UnknownCalendar(String),

    #[error("duration {0:?} is out of range")]
    OutOfRange(Duration),

    #[error("no expected check-in within {0} days")]
    NoUpcomingOccurrence(u32),
}
