//! Check-in schedule evaluation.
//!
//! This crate provides:
//! - [`ScheduleSpec`]: the immutable schedule model (interval, weekdays, banking days)
//! - [`HolidayCalendar`] implementations backing banking-day schedules
//! - [`next_occurrence`]: pure next-expected-check-in computation
//! - [`validate`]: the inclusive tolerance-window check for an observed check-in
//!
//! Nothing here holds state between calls; every result is recomputed from
//! "now" and the schedule.

pub mod calendar;
pub mod engine;
pub mod error;
pub mod model;
pub mod tolerance;

pub use calendar::{BankingCalendar, BuiltinCalendar, FederalReserveHolidays, HolidayCalendar, HolidaySet};
pub use engine::{next_occurrence, ExpectedOccurrence};
pub use error::InvalidScheduleError;
pub use model::{DaySchedule, ScheduleSpec, TimeSlot};
pub use tolerance::{validate, OutOfToleranceError};
