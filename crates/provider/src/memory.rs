//! In-process alert provider.
//!
//! Keeps services, incidents and snoozes in memory. Backs `--dry-run` and
//! the orchestrator tests, with switches for injecting failures and latency.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::traits::{
    incident_title, AlertProvider, EscalationPolicy, Incident, IncidentStatus, ProviderError, Service,
};

/// One recorded snooze call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnoozeRecord {
    pub incident_id: String,
    pub service_id: String,
    pub from: DateTime<Utc>,
    pub duration: Duration,
}

impl SnoozeRecord {
    /// Instant the snooze lapses.
    pub fn until(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.duration)
            .ok()
            .and_then(|d| self.from.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    /// Keyed by service name.
    services: BTreeMap<String, Service>,
    policies: Vec<EscalationPolicy>,
    incidents: BTreeMap<String, Incident>,
    snoozes: Vec<SnoozeRecord>,
    failing: HashSet<&'static str>,
    fail_everything: bool,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:04}", self.next_id)
    }

    fn check(&self, operation: &'static str) -> Result<(), ProviderError> {
        if self.fail_everything || self.failing.contains(operation) {
            return Err(ProviderError::Unavailable(format!("injected failure in {operation}")));
        }
        Ok(())
    }
}

/// Alert provider that lives entirely in this process.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    state: Mutex<State>,
    latency: Option<Duration>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an escalation policy that lookups can find.
    pub fn with_policy(self, id: &str, name: &str) -> Self {
        self.lock().policies.push(EscalationPolicy {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    /// Sleep this long before answering any call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make `operation` (e.g. `"snooze_incident"`) fail until cleared.
    pub fn fail_on(&self, operation: &'static str) {
        self.lock().failing.insert(operation);
    }

    /// Make every operation fail until cleared.
    pub fn fail_all(&self) {
        self.lock().fail_everything = true;
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing.clear();
        state.fail_everything = false;
    }

    pub fn services(&self) -> Vec<Service> {
        self.lock().services.values().cloned().collect()
    }

    pub fn incidents(&self) -> Vec<Incident> {
        self.lock().incidents.values().cloned().collect()
    }

    /// Every snooze applied so far, oldest first.
    pub fn snoozes(&self) -> Vec<SnoozeRecord> {
        self.lock().snoozes.clone()
    }

    pub fn last_snooze(&self) -> Option<SnoozeRecord> {
        self.lock().snoozes.last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory provider lock poisoned")
    }

    async fn enter(&self, operation: &'static str) -> Result<(), ProviderError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.lock().check(operation)
    }
}

#[async_trait::async_trait]
impl AlertProvider for MemoryProvider {
    async fn list_abilities(&self) -> Result<Vec<String>, ProviderError> {
        self.enter("list_abilities").await?;
        Ok(vec!["memory".to_string()])
    }

    async fn find_or_create_service(&self, name: &str, _policy: &EscalationPolicy) -> Result<Service, ProviderError> {
        self.enter("find_or_create_service").await?;
        let mut state = self.lock();
        if let Some(service) = state.services.get(name) {
            return Ok(service.clone());
        }
        let service = Service {
            id: state.next_id("SVC"),
            name: name.to_string(),
        };
        state.services.insert(name.to_string(), service.clone());
        tracing::debug!(service_id = %service.id, service_name = %service.name, "created in-memory service");
        Ok(service)
    }

    async fn find_escalation_policy(&self, id_or_name: &str) -> Result<EscalationPolicy, ProviderError> {
        self.enter("find_escalation_policy").await?;
        let state = self.lock();
        let found = state
            .policies
            .iter()
            .find(|p| p.id == id_or_name)
            .or_else(|| state.policies.iter().find(|p| p.name == id_or_name))
            .cloned();
        found.ok_or_else(|| ProviderError::NotFound {
            kind: "escalation policy",
            key: id_or_name.to_string(),
        })
    }

    async fn find_or_create_incident(
        &self,
        service: &Service,
        _policy: &EscalationPolicy,
    ) -> Result<Incident, ProviderError> {
        self.enter("find_or_create_incident").await?;
        let mut state = self.lock();
        if let Some(open) = state
            .incidents
            .values()
            .find(|i| i.service_id == service.id && i.status.is_open())
        {
            return Ok(open.clone());
        }
        let incident = Incident {
            id: state.next_id("INC"),
            title: incident_title(service),
            status: IncidentStatus::Triggered,
            service_id: service.id.clone(),
        };
        state.incidents.insert(incident.id.clone(), incident.clone());
        Ok(incident)
    }

    async fn snooze_incident(
        &self,
        incident: &Incident,
        service: &Service,
        from: DateTime<Utc>,
        duration: Duration,
    ) -> Result<(), ProviderError> {
        self.enter("snooze_incident").await?;
        let mut state = self.lock();
        let stored = state
            .incidents
            .get_mut(&incident.id)
            .ok_or_else(|| ProviderError::NotFound {
                kind: "incident",
                key: incident.id.clone(),
            })?;
        stored.status = IncidentStatus::Acknowledged;
        state.snoozes.push(SnoozeRecord {
            incident_id: incident.id.clone(),
            service_id: service.id.clone(),
            from,
            duration,
        });
        Ok(())
    }

    async fn resolve_incident(&self, incident: &Incident) -> Result<(), ProviderError> {
        self.enter("resolve_incident").await?;
        let mut state = self.lock();
        match state.incidents.get_mut(&incident.id) {
            Some(stored) => {
                stored.status = IncidentStatus::Resolved;
                Ok(())
            }
            None => Err(ProviderError::NotFound {
                kind: "incident",
                key: incident.id.clone(),
            }),
        }
    }

    async fn delete_service(&self, service: &Service) -> Result<(), ProviderError> {
        self.enter("delete_service").await?;
        let mut state = self.lock();
        state.services.retain(|_, s| s.id != service.id);
        state.incidents.retain(|_, i| i.service_id != service.id);
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}
