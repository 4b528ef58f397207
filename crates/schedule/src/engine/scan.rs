//! Day-by-day scanning over a [`DaySchedule`] in its own timezone.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::calendar::is_weekday;
use crate::error::InvalidScheduleError;
use crate::model::{DaySchedule, ScheduleSpec, TimeSlot};

use super::MAX_SCAN_DAYS;

/// Which local dates carry slots for `spec`.
pub(super) fn day_filter(spec: &ScheduleSpec) -> impl Fn(NaiveDate) -> bool + '_ {
    move |date| match spec {
        ScheduleSpec::BankingDays { calendar, .. } => calendar.is_banking_day(date),
        _ => is_weekday(date),
    }
}

/// First slot instant strictly after `now` on an expected day.
pub(super) fn scan_forward(
    now: DateTime<Utc>,
    day: &DaySchedule,
    is_expected_day: impl Fn(NaiveDate) -> bool,
) -> Result<(DateTime<Utc>, TimeSlot), InvalidScheduleError> {
    let slots = sorted_slots(day)?;
    let today = now.with_timezone(&day.timezone).date_naive();

    for offset in 0..=MAX_SCAN_DAYS {
        let Some(date) = today.checked_add_days(Days::new(offset.into())) else {
            break;
        };
        if !is_expected_day(date) {
            continue;
        }
        for slot in &slots {
            if let Some(instant) = resolve_local(day.timezone, date, slot.clock_time) {
                if instant > now {
                    return Ok((instant, *slot));
                }
            }
        }
    }

    Err(InvalidScheduleError::NoUpcomingOccurrence(MAX_SCAN_DAYS))
}

fn sorted_slots(day: &DaySchedule) -> Result<Vec<TimeSlot>, InvalidScheduleError> {
    if day.slots.is_empty() {
        return Err(InvalidScheduleError::EmptySlots);
    }
    let mut slots = day.slots.clone();
    slots.sort_by_key(|s| s.clock_time);
    Ok(slots)
}

/// Map a local wall-clock time to UTC.
///
/// Ambiguous times (clocks falling back) take the earlier instant. Times
/// inside a spring-forward gap move one hour later.
pub(super) fn resolve_local(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    let naive = date.and_time(time);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            naive
                .checked_add_signed(chrono::Duration::hours(1))
                .and_then(|later| tz.from_local_datetime(&later).earliest())
        })
        .map(|dt| dt.with_timezone(&Utc))
}
