//! Next-expected-check-in computation.
//!
//! Every function here is a pure function of `now` and the schedule (plus the
//! timezone database), so repeated evaluation never drifts from a stored value.

mod scan;


use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::InvalidScheduleError;
use crate::model::ScheduleSpec;

use self::scan::{day_filter, scan_forward};

/// Upper bound on how many days a day-based scan looks ahead or behind.
pub const MAX_SCAN_DAYS: u32 = 366;

/// An expected check-in instant and the inclusive window around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedOccurrence {
    pub instant: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

impl ExpectedOccurrence {
    /// `instant` with `tolerance` on both sides.
    fn around(instant: DateTime<Utc>, tolerance: Duration) -> Result<Self, InvalidScheduleError> {
        Ok(Self {
            instant,
            window_start: shift(instant, tolerance, Shift::Back)?,
            window_end: shift(instant, tolerance, Shift::Forward)?,
        })
    }

    /// Whether `t` lies inside the window, boundaries included.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.window_start <= t && t <= self.window_end
    }
}

/// The first expected check-in strictly after `now`, and how long until it.
///
/// For interval schedules the instant is exactly `now + period` and the
/// window spans the whole period (widened by the configured tolerance).
pub fn next_occurrence(
    now: DateTime<Utc>,
    spec: &ScheduleSpec,
) -> Result<(ExpectedOccurrence, Duration), InvalidScheduleError> {
    match spec {
        ScheduleSpec::Interval { period, tolerance } => {
            if period.is_zero() {
                return Err(InvalidScheduleError::NonPositivePeriod);
            }
            let instant = shift(now, *period, Shift::Forward)?;
            let occurrence = ExpectedOccurrence {
                instant,
                window_start: shift(now, *tolerance, Shift::Back)?,
                window_end: shift(instant, *tolerance, Shift::Forward)?,
            };
            Ok((occurrence, *period))
        }
        ScheduleSpec::Weekdays(day) | ScheduleSpec::BankingDays { schedule: day, .. } => {
            let (instant, slot) = scan_forward(now, day, day_filter(spec))?;
            let occurrence = ExpectedOccurrence::around(instant, slot.tolerance)?;
            let wait = (instant - now).to_std().unwrap_or_default();
            Ok((occurrence, wait))
        }
    }
}

#[derive(Clone, Copy)]
enum Shift {
    Back,
    Forward,
}

/// `t` moved by `d`, failing instead of overflowing chrono's date range.
fn shift(t: DateTime<Utc>, d: Duration, direction: Shift) -> Result<DateTime<Utc>, InvalidScheduleError> {
    let out_of_range = || InvalidScheduleError::OutOfRange(d);
    let delta = chrono::Duration::from_std(d).map_err(|_| out_of_range())?;
    match direction {
        Shift::Back => t.checked_sub_signed(delta),
        Shift::Forward => t.checked_add_signed(delta),
    }
    .ok_or_else(out_of_range)
}
