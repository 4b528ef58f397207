//! Holiday calendars that decide which weekdays are banking days.
//!
//! The holiday set is always an input: either explicit dates from config
//! ([`HolidaySet`]), a rule-computed calendar ([`FederalReserveHolidays`]),
//! or both combined in a [`BankingCalendar`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::error::InvalidScheduleError;

/// Decides whether a calendar date is a holiday.
pub trait HolidayCalendar: Send + Sync {
    fn is_holiday(&self, date: NaiveDate) -> bool;
}

/// Whether `date` is Monday through Friday.
pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

// ── Explicit dates ──────────────────────────────────────────────────

/// A fixed set of holiday dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidaySet {
    dates: BTreeSet<NaiveDate>,
}

impl HolidaySet {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }
}

impl HolidayCalendar for HolidaySet {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }
}

// ── US Federal Reserve ──────────────────────────────────────────────

/// US Federal Reserve bank holidays, computed from their rules.
///
/// Fixed-date holidays that fall on a Sunday are observed the following
/// Monday. Saturday holidays are not moved (the preceding Friday stays a
/// banking day).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FederalReserveHolidays;

impl FederalReserveHolidays {
    fn is_fixed_date_holiday(date: NaiveDate) -> bool {
        match (date.month(), date.day()) {
            (1, 1) | (7, 4) | (11, 11) | (12, 25) => true,
            // Juneteenth became a Federal Reserve holiday in 2022.
            (6, 19) => date.year() >= 2022,
            _ => false,
        }
    }

    fn is_floating_holiday(date: NaiveDate) -> bool {
        let year = date.year();
        let candidates = [
            nth_weekday(year, 1, Weekday::Mon, 3),  // Martin Luther King Jr. Day
            nth_weekday(year, 2, Weekday::Mon, 3),  // Washington's Birthday
            last_weekday(year, 5, Weekday::Mon),    // Memorial Day
            nth_weekday(year, 9, Weekday::Mon, 1),  // Labor Day
            nth_weekday(year, 10, Weekday::Mon, 2), // Columbus Day
            nth_weekday(year, 11, Weekday::Thu, 4), // Thanksgiving Day
        ];
        candidates.into_iter().flatten().any(|d| d == date)
    }
}

impl HolidayCalendar for FederalReserveHolidays {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        if Self::is_fixed_date_holiday(date) || Self::is_floating_holiday(date) {
            return true;
        }
        // Sunday holidays move to Monday.
        date.weekday() == Weekday::Mon
            && date
                .checked_sub_days(Days::new(1))
                .is_some_and(Self::is_fixed_date_holiday)
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    // The 5th occurrence exists in some months only.
    nth_weekday(year, month, weekday, 5).or_else(|| nth_weekday(year, month, weekday, 4))
}

// ── Built-in calendar selection ─────────────────────────────────────

/// Calendars selectable by name from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinCalendar {
    FederalReserve,
}

impl fmt::Display for BuiltinCalendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuiltinCalendar::FederalReserve => write!(f, "us-federal-reserve"),
        }
    }
}

impl FromStr for BuiltinCalendar {
    type Err = InvalidScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us-federal-reserve" | "federal-reserve" | "frb" => Ok(BuiltinCalendar::FederalReserve),
            other => Err(InvalidScheduleError::UnknownCalendar(other.to_string())),
        }
    }
}

impl HolidayCalendar for BuiltinCalendar {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        match self {
            BuiltinCalendar::FederalReserve => FederalReserveHolidays.is_holiday(date),
        }
    }
}

// ── Banking calendar ────────────────────────────────────────────────

/// Holidays observed by a banking-day schedule: an optional built-in
/// calendar plus explicitly configured dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankingCalendar {
    pub builtin: Option<BuiltinCalendar>,
    pub extra: HolidaySet,
}

impl BankingCalendar {
    pub fn new(builtin: Option<BuiltinCalendar>, extra: HolidaySet) -> Self {
        Self { builtin, extra }
    }

    /// A weekday that is not a holiday.
    pub fn is_banking_day(&self, date: NaiveDate) -> bool {
        is_weekday(date) && !self.is_holiday(date)
    }
}

impl HolidayCalendar for BankingCalendar {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.extra.is_holiday(date) || self.builtin.is_some_and(|b| b.is_holiday(date))
    }
}
