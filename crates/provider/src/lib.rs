//! Alert provider clients for the check-in watchdog.
//!
//! This crate provides:
//! - `AlertProvider` trait: the capability surface the orchestrator drives
//! - `PagerDutyClient`: REST API v2 implementation
//! - `MemoryProvider`: in-process implementation for dry runs and tests

pub mod memory;
pub mod pagerduty;
pub mod traits;

pub use memory::{MemoryProvider, SnoozeRecord};
pub use pagerduty::PagerDutyClient;
pub use traits::{AlertProvider, EscalationPolicy, Incident, IncidentStatus, ProviderError, Service};
