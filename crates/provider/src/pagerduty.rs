//! PagerDuty REST API v2 client.
//!
//! Every operation is a lookup against the API; nothing is cached between
//! calls, so services or incidents removed out of band are recreated on the
//! next orchestration step.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use deadcheck_core::config::PagerDutyConfig;
use deadcheck_core::{SystemTimeSource, TimeSource};

use crate::traits::{
    incident_title, snooze_seconds, AlertProvider, EscalationPolicy, Incident, IncidentStatus,
    ProviderError, Service,
};

/// Public REST API root.
pub const DEFAULT_BASE_URL: &str = "https://api.pagerduty.com";

const ACCEPT: &str = "application/vnd.pagerduty+json;version=2";

/// How long a freshly created service stays in maintenance.
const INITIAL_MAINTENANCE: Duration = Duration::from_secs(5 * 60);

/// Talks to PagerDuty on behalf of one account/escalation policy pair.
pub struct PagerDutyClient {
    api_key: String,
    /// Email of the account user that mutations are attributed to.
    from: String,
    base_url: String,
    clock: Arc<dyn TimeSource>,
    client: reqwest::Client,
}

impl std::fmt::Debug for PagerDutyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagerDutyClient")
            .field("from", &self.from)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PagerDutyClient {
    /// Build a client without contacting the API.
    ///
    /// Returns [`ProviderError::Config`] if the API key or `from` address is empty.
    pub fn new(config: &PagerDutyConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::Config("PagerDuty apiKey must not be empty".to_string()));
        }
        if config.from.trim().is_empty() {
            return Err(ProviderError::Config("PagerDuty from must not be empty".to_string()));
        }

        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            api_key: config.api_key.clone(),
            from: config.from.clone(),
            base_url,
            clock: Arc::new(SystemTimeSource),
            client: reqwest::Client::new(),
        })
    }

    /// Build a client and verify the credentials by listing abilities.
    pub async fn connect(config: &PagerDutyConfig) -> Result<Self, ProviderError> {
        let client = Self::new(config)?;
        client.ping().await?;
        Ok(client)
    }

    /// Use `clock` for maintenance window timestamps.
    pub fn with_time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Fail unless the credentials carry at least one ability.
    pub async fn ping(&self) -> Result<(), ProviderError> {
        let abilities = self.list_abilities().await?;
        if abilities.is_empty() {
            return Err(ProviderError::Config(
                "PagerDuty credentials have no abilities".to_string(),
            ));
        }
        tracing::debug!(abilities = abilities.len(), "PagerDuty credentials verified");
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(reqwest::header::AUTHORIZATION, format!("Token token={}", self.api_key))
            .header(reqwest::header::ACCEPT, ACCEPT)
    }

    /// A request attributed to the configured user.
    fn mutation(&self, method: Method, path: &str) -> RequestBuilder {
        self.request(method, path).header("From", self.from.as_str())
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        tracing::warn!(operation, %status, body = %body, "PagerDuty returned non-2xx status");
        Err(ProviderError::Status {
            operation,
            status: status.as_u16(),
            body,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = self.send(operation, request).await?;
        response.json::<T>().await.map_err(|e| ProviderError::Decode {
            operation,
            message: e.to_string(),
        })
    }

    // ── Services ────────────────────────────────────────────────────

    async fn find_service(&self, name: &str) -> Result<Option<Service>, ProviderError> {
        let request = self.request(Method::GET, "/services").query(&[("query", name)]);
        let page: ServicesPage = self.send_json("list services", request).await?;
        Ok(page
            .services
            .into_iter()
            .find(|s| s.name == name)
            .map(Service::from))
    }

    async fn create_service(&self, name: &str, policy: &EscalationPolicy) -> Result<Service, ProviderError> {
        let body = json!({
            "service": {
                "type": "service",
                "name": name,
                "description": "Check-in watchdog managed by deadcheck",
                "escalation_policy": {
                    "id": policy.id,
                    "type": "escalation_policy_reference",
                },
            }
        });
        let request = self.mutation(Method::POST, "/services").json(&body);
        let created: ServiceEnvelope = self.send_json("create service", request).await?;
        Ok(created.service.into())
    }

    /// Keep a new service quiet while its incident is being armed.
    async fn start_maintenance(&self, service: &Service) -> Result<(), ProviderError> {
        let start = self.clock.now();
        let end = start + chrono::Duration::seconds(INITIAL_MAINTENANCE.as_secs() as i64);
        let body = json!({
            "maintenance_window": {
                "type": "maintenance_window",
                "start_time": start.to_rfc3339_opts(SecondsFormat::Secs, true),
                "end_time": end.to_rfc3339_opts(SecondsFormat::Secs, true),
                "description": "deadcheck initial setup",
                "services": [{ "id": service.id, "type": "service_reference" }],
            }
        });
        let request = self.mutation(Method::POST, "/maintenance_windows").json(&body);
        self.send("create maintenance window", request).await?;
        Ok(())
    }

    // ── Escalation policies ─────────────────────────────────────────

    async fn get_escalation_policy(&self, id: &str) -> Result<Option<EscalationPolicy>, ProviderError> {
        let request = self.request(Method::GET, &format!("/escalation_policies/{id}"));
        match self.send_json::<EscalationPolicyEnvelope>("get escalation policy", request).await {
            Ok(found) => Ok(Some(found.escalation_policy.into())),
            Err(ProviderError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn search_escalation_policy(&self, name: &str) -> Result<Option<EscalationPolicy>, ProviderError> {
        let request = self
            .request(Method::GET, "/escalation_policies")
            .query(&[("query", name)]);
        let page: EscalationPoliciesPage = self.send_json("list escalation policies", request).await?;
        Ok(page
            .escalation_policies
            .into_iter()
            .find(|p| p.name == name)
            .map(EscalationPolicy::from))
    }

    // ── Incidents ───────────────────────────────────────────────────

    async fn find_open_incident(&self, service: &Service) -> Result<Option<Incident>, ProviderError> {
        let request = self.request(Method::GET, "/incidents").query(&[
            ("service_ids[]", service.id.as_str()),
            ("statuses[]", "triggered"),
            ("statuses[]", "acknowledged"),
        ]);
        let page: IncidentsPage = self.send_json("list incidents", request).await?;
        Ok(page
            .incidents
            .into_iter()
            .map(Incident::from)
            .find(|i| i.status.is_open()))
    }

    async fn create_incident(&self, service: &Service, policy: &EscalationPolicy) -> Result<Incident, ProviderError> {
        let body = json!({
            "incident": {
                "type": "incident",
                "title": incident_title(service),
                "service": { "id": service.id, "type": "service_reference" },
                "escalation_policy": { "id": policy.id, "type": "escalation_policy_reference" },
                "body": {
                    "type": "incident_body",
                    "details": "This incident stays snoozed while check-ins arrive on schedule.",
                },
            }
        });
        let request = self.mutation(Method::POST, "/incidents").json(&body);
        let created: IncidentEnvelope = self.send_json("create incident", request).await?;
        Ok(created.incident.into())
    }

    async fn update_status(&self, incident: &Incident, status: IncidentStatus) -> Result<(), ProviderError> {
        let body = json!({
            "incident": { "type": "incident_reference", "status": status }
        });
        let request = self
            .mutation(Method::PUT, &format!("/incidents/{}", incident.id))
            .json(&body);
        self.send("update incident", request).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AlertProvider for PagerDutyClient {
    async fn list_abilities(&self) -> Result<Vec<String>, ProviderError> {
        let request = self.request(Method::GET, "/abilities");
        let page: AbilitiesPage = self.send_json("list abilities", request).await?;
        Ok(page.abilities)
    }

    async fn find_or_create_service(&self, name: &str, policy: &EscalationPolicy) -> Result<Service, ProviderError> {
        if let Some(service) = self.find_service(name).await? {
            tracing::debug!(service_id = %service.id, service_name = %service.name, "found PagerDuty service");
            return Ok(service);
        }

        let service = self.create_service(name, policy).await?;
        self.start_maintenance(&service).await?;
        tracing::info!(service_id = %service.id, service_name = %service.name, "created PagerDuty service");
        Ok(service)
    }

    async fn find_escalation_policy(&self, id_or_name: &str) -> Result<EscalationPolicy, ProviderError> {
        if let Some(policy) = self.get_escalation_policy(id_or_name).await? {
            return Ok(policy);
        }
        self.search_escalation_policy(id_or_name)
            .await?
            .ok_or_else(|| ProviderError::NotFound {
                kind: "escalation policy",
                key: id_or_name.to_string(),
            })
    }

    async fn find_or_create_incident(
        &self,
        service: &Service,
        policy: &EscalationPolicy,
    ) -> Result<Incident, ProviderError> {
        if let Some(incident) = self.find_open_incident(service).await? {
            return Ok(incident);
        }
        let incident = self.create_incident(service, policy).await?;
        tracing::info!(incident_id = %incident.id, service_id = %service.id, "created PagerDuty incident");
        Ok(incident)
    }

    async fn snooze_incident(
        &self,
        incident: &Incident,
        service: &Service,
        from: DateTime<Utc>,
        duration: Duration,
    ) -> Result<(), ProviderError> {
        // Only acknowledged incidents can be snoozed.
        if incident.status == IncidentStatus::Triggered {
            self.update_status(incident, IncidentStatus::Acknowledged).await?;
        }

        let seconds = snooze_seconds(duration);
        let request = self
            .mutation(Method::POST, &format!("/incidents/{}/snooze", incident.id))
            .json(&json!({ "duration": seconds }));
        self.send("snooze incident", request).await?;

        let until = i64::try_from(seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|d| from.checked_add_signed(d));
        tracing::info!(
            incident_id = %incident.id,
            service_id = %service.id,
            until = ?until,
            seconds,
            "snoozed PagerDuty incident"
        );
        Ok(())
    }

    async fn resolve_incident(&self, incident: &Incident) -> Result<(), ProviderError> {
        self.update_status(incident, IncidentStatus::Resolved).await?;
        tracing::info!(incident_id = %incident.id, "resolved PagerDuty incident");
        Ok(())
    }

    async fn delete_service(&self, service: &Service) -> Result<(), ProviderError> {
        let request = self.mutation(Method::DELETE, &format!("/services/{}", service.id));
        self.send("delete service", request).await?;
        tracing::info!(service_id = %service.id, "deleted PagerDuty service");
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "pagerduty"
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AbilitiesPage {
    abilities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Reference {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireService {
    id: String,
    name: String,
}

impl From<WireService> for Service {
    fn from(w: WireService) -> Self {
        Service { id: w.id, name: w.name }
    }
}

#[derive(Debug, Deserialize)]
struct ServicesPage {
    services: Vec<WireService>,
}

#[derive(Debug, Deserialize)]
struct ServiceEnvelope {
    service: WireService,
}

#[derive(Debug, Deserialize)]
struct WirePolicy {
    id: String,
    #[serde(default)]
    name: String,
}

impl From<WirePolicy> for EscalationPolicy {
    fn from(w: WirePolicy) -> Self {
        EscalationPolicy { id: w.id, name: w.name }
    }
}

#[derive(Debug, Deserialize)]
struct EscalationPolicyEnvelope {
    escalation_policy: WirePolicy,
}

#[derive(Debug, Deserialize)]
struct EscalationPoliciesPage {
    escalation_policies: Vec<WirePolicy>,
}

#[derive(Debug, Deserialize)]
struct WireIncident {
    id: String,
    #[serde(default)]
    title: String,
    status: IncidentStatus,
    service: Reference,
}

impl From<WireIncident> for Incident {
    fn from(w: WireIncident) -> Self {
        Incident {
            id: w.id,
            title: w.title,
            status: w.status,
            service_id: w.service.id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IncidentsPage {
    incidents: Vec<WireIncident>,
}

#[derive(Debug, Deserialize)]
struct IncidentEnvelope {
    incident: WireIncident,
}

#[cfg(test)]
mod tests;
