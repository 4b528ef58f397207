//! Immutable schedule model built from the raw config block.

use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;

use deadcheck_core::config::{BankingDays, PartialDay, ScheduleConfig, Times};
use deadcheck_core::parse_duration;

use crate::calendar::{BankingCalendar, BuiltinCalendar, HolidaySet};
use crate::error::InvalidScheduleError;

/// When check-ins are expected. Exactly one variant is active by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleSpec {
    /// A check-in every `period`.
    Interval {
        period: Duration,
        /// Explicit slack on top of the period; zero when not configured.
        tolerance: Duration,
    },
    /// Times of day, Monday through Friday.
    Weekdays(DaySchedule),
    /// Times of day on weekdays that are not holidays in `calendar`.
    BankingDays {
        schedule: DaySchedule,
        calendar: BankingCalendar,
    },
}

/// Timezone plus the slots expected on each matching day.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySchedule {
    pub timezone: Tz,
    /// Kept sorted by clock time.
    pub slots: Vec<TimeSlot>,
}

impl DaySchedule {
    pub fn new(timezone: Tz, mut slots: Vec<TimeSlot>) -> Self {
        slots.sort_by_key(|s| s.clock_time);
        Self { timezone, slots }
    }
}

/// One expected clock time and its symmetric tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub clock_time: NaiveTime,
    pub tolerance: Duration,
}

impl TimeSlot {
    /// Parse an `HH:MM` clock time and a compact tolerance string.
    pub fn parse(at: &str, tolerance: &str) -> Result<Self, InvalidScheduleError> {
        let clock_time = NaiveTime::parse_from_str(at.trim(), "%H:%M")
            .map_err(|_| InvalidScheduleError::InvalidClockTime(at.to_string()))?;
        let tolerance = parse_duration(tolerance)
            .ok_or_else(|| InvalidScheduleError::InvalidTolerance(tolerance.to_string()))?;
        Ok(Self {
            clock_time,
            tolerance,
        })
    }
}

impl ScheduleSpec {
    /// Build and validate a schedule from its config block.
    pub fn from_config(config: &ScheduleConfig) -> Result<Self, InvalidScheduleError> {
        match (&config.every, &config.weekdays, &config.banking_days) {
            (None, None, None) => Err(InvalidScheduleError::NoVariant),
            (Some(every), None, None) => Self::interval_from_config(every, config.tolerance.as_deref()),
            (None, Some(weekdays), None) => Ok(ScheduleSpec::Weekdays(day_schedule(weekdays)?)),
            (None, None, Some(banking)) => Self::banking_from_config(banking),
            _ => Err(InvalidScheduleError::MultipleVariants),
        }
    }

    fn interval_from_config(every: &str, tolerance: Option<&str>) -> Result<Self, InvalidScheduleError> {
        let period = parse_duration(every)
            .ok_or_else(|| InvalidScheduleError::InvalidPeriod(every.to_string()))?;
        if period.is_zero() {
            return Err(InvalidScheduleError::NonPositivePeriod);
        }
        let tolerance = match tolerance {
            Some(raw) => parse_duration(raw)
                .ok_or_else(|| InvalidScheduleError::InvalidTolerance(raw.to_string()))?,
            None => Duration::ZERO,
        };
        Ok(ScheduleSpec::Interval { period, tolerance })
    }

    fn banking_from_config(banking: &BankingDays) -> Result<Self, InvalidScheduleError> {
        let schedule = build_day_schedule(&banking.timezone, &banking.times)?;
        let builtin = banking
            .calendar
            .as_deref()
            .map(str::parse::<BuiltinCalendar>)
            .transpose()?;
        let calendar = BankingCalendar::new(builtin, HolidaySet::new(banking.holidays.iter().copied()));
        Ok(ScheduleSpec::BankingDays { schedule, calendar })
    }

    /// Short label for logs and API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ScheduleSpec::Interval { .. } => "interval",
            ScheduleSpec::Weekdays(_) => "weekdays",
            ScheduleSpec::BankingDays { .. } => "banking-days",
        }
    }

    /// Timezone of the day-based variants.
    pub fn timezone(&self) -> Option<Tz> {
        match self {
            ScheduleSpec::Interval { .. } => None,
            ScheduleSpec::Weekdays(day) | ScheduleSpec::BankingDays { schedule: day, .. } => {
                Some(day.timezone)
            }
        }
    }
}

fn day_schedule(partial: &PartialDay) -> Result<DaySchedule, InvalidScheduleError> {
    build_day_schedule(&partial.timezone, &partial.times)
}

fn build_day_schedule(timezone: &str, times: &[Times]) -> Result<DaySchedule, InvalidScheduleError> {
    let tz: Tz = timezone
        .trim()
        .parse()
        .map_err(|_| InvalidScheduleError::UnknownTimezone(timezone.to_string()))?;
    if times.is_empty() {
        return Err(InvalidScheduleError::EmptySlots);
    }
    let slots = times
        .iter()
        .map(|t| TimeSlot::parse(&t.at, &t.tolerance))
        .collect::<Result<Vec<_>, _>>()?;
    let schedule = DaySchedule::new(tz, slots);
    warn_on_overlapping_windows(&schedule);
    Ok(schedule)
}

/// Tolerances are expected to be much smaller than the gap between slots.
fn warn_on_overlapping_windows(schedule: &DaySchedule) {
    for pair in schedule.slots.windows(2) {
        let gap = (pair[1].clock_time - pair[0].clock_time).to_std().unwrap_or_default();
        if pair[0].tolerance + pair[1].tolerance >= gap {
            tracing::warn!(
                first = %pair[0].clock_time,
                second = %pair[1].clock_time,
                timezone = %schedule.timezone,
                "tolerance windows of consecutive slots overlap"
            );
        }
    }
}
