//! Judging an observed check-in against its expected window.

use chrono::{DateTime, Utc};

use crate::engine::ExpectedOccurrence;

/// A check-in landed outside the tolerance window of its occurrence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "check-in at {observed} is {} {} the expected {expected} (window {window_start} .. {window_end})",
    magnitude(.delta),
    direction(.delta)
)]
pub struct OutOfToleranceError {
    pub expected: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub observed: DateTime<Utc>,
    /// `observed - expected`; negative when early.
    pub delta: chrono::Duration,
}

impl OutOfToleranceError {
    pub fn is_early(&self) -> bool {
        self.observed < self.window_start
    }

    pub fn is_late(&self) -> bool {
        self.observed > self.window_end
    }
}

fn direction(delta: &chrono::Duration) -> &'static str {
    if *delta < chrono::Duration::zero() {
        "before"
    } else {
        "after"
    }
}

fn magnitude(delta: &chrono::Duration) -> String {
    let secs = delta.num_seconds().unsigned_abs();
    deadcheck_core::format_duration(std::time::Duration::from_secs(secs))
}

/// Accept `observed` when it lies within the occurrence window, boundaries
/// included.
pub fn validate(observed: DateTime<Utc>, expected: &ExpectedOccurrence) -> Result<(), OutOfToleranceError> {
    if expected.contains(observed) {
        return Ok(());
    }
    Err(OutOfToleranceError {
        expected: expected.instant,
        window_start: expected.window_start,
        window_end: expected.window_end,
        observed,
        delta: observed - expected.instant,
    })
}
