//! Incident lifecycle orchestration for monitored checks.
//!
//! This crate provides:
//! - `CheckDefinition`: a configured check with its validated schedule
//! - `IncidentOrchestrator`: keeps one snoozed incident per check armed
//! - `CallContext`: cancellation and deadline applied to provider calls
//! - `MonitorError`: failures tagged with the check and the stage that failed

pub mod check;
pub mod context;
pub mod error;
pub mod orchestrator;

pub use check::CheckDefinition;
pub use context::CallContext;
pub use error::{MonitorError, Stage};
pub use orchestrator::{Armed, IncidentHandle, IncidentOrchestrator};
