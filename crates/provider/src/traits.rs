//! AlertProvider trait definition and shared types.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Errors that can occur while talking to an alert provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} returned {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected response from {operation}: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out after {}", deadcheck_core::format_duration(*.0))]
    Timeout(Duration),
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }
}

/// A provider-side service that incidents are opened against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub id: String,
    pub name: String,
}

/// A provider-side escalation policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationPolicy {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Triggered,
    Acknowledged,
    Resolved,
}

impl IncidentStatus {
    pub fn is_open(self) -> bool {
        !matches!(self, IncidentStatus::Resolved)
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IncidentStatus::Triggered => "triggered",
            IncidentStatus::Acknowledged => "acknowledged",
            IncidentStatus::Resolved => "resolved",
        };
        f.write_str(s)
    }
}

/// The standing incident that represents "this check is being watched".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub status: IncidentStatus,
    pub service_id: String,
}

/// Capability surface an incident-management backend must offer.
///
/// Implementations hold no watchdog state of their own beyond what the
/// backend stores; every lookup goes to the backend. Cancellation and
/// timeouts are applied by the caller, which may drop any returned future.
#[async_trait::async_trait]
pub trait AlertProvider: Send + Sync {
    /// Abilities granted to the configured credentials.
    async fn list_abilities(&self) -> Result<Vec<String>, ProviderError>;

    /// Find a service by exact name, creating it routed to `policy` when absent.
    async fn find_or_create_service(&self, name: &str, policy: &EscalationPolicy) -> Result<Service, ProviderError>;

    /// Find an escalation policy by id, falling back to an exact name match.
    async fn find_escalation_policy(&self, id_or_name: &str) -> Result<EscalationPolicy, ProviderError>;

    /// Find an open incident on `service`, creating one routed to `policy` when absent.
    async fn find_or_create_incident(
        &self,
        service: &Service,
        policy: &EscalationPolicy,
    ) -> Result<Incident, ProviderError>;

    /// Suppress escalation of `incident` for `duration` starting at `from`.
    async fn snooze_incident(
        &self,
        incident: &Incident,
        service: &Service,
        from: DateTime<Utc>,
        duration: Duration,
    ) -> Result<(), ProviderError>;

    async fn resolve_incident(&self, incident: &Incident) -> Result<(), ProviderError>;

    async fn delete_service(&self, service: &Service) -> Result<(), ProviderError>;

    /// Human-readable name for this backend (e.g., "pagerduty", "memory").
    fn provider_name(&self) -> &str;
}

/// Title of the standing incident opened for a service.
pub fn incident_title(service: &Service) -> String {
    format!("deadcheck: {} missed its check-in", service.name)
}

/// Snooze length in whole seconds, never below one.
pub fn snooze_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs().saturating_add(u64::from(duration.subsec_nanos() > 0));
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snooze_seconds_rounds_up_and_floors_at_one() {
        assert_eq!(snooze_seconds(Duration::ZERO), 1);
        assert_eq!(snooze_seconds(Duration::from_millis(1_500)), 2);
        assert_eq!(snooze_seconds(Duration::from_secs(3_600)), 3_600);
    }

    #[test]
    fn resolved_incidents_are_not_open() {
        assert!(IncidentStatus::Triggered.is_open());
        assert!(IncidentStatus::Acknowledged.is_open());
        assert!(!IncidentStatus::Resolved.is_open());
    }
}
