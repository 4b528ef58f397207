//! Keeps one standing, snoozed incident per check.
//!
//! Provider-side objects are looked up (and created when missing) on every
//! call. The only state that matters lives with the provider: as long as
//! check-ins keep renewing the snooze the incident stays quiet, and once a
//! snooze lapses the provider escalates on its own.


use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use deadcheck_core::{format_duration, TimeSource};
use deadcheck_provider::{AlertProvider, EscalationPolicy, Incident, ProviderError, Service};
use deadcheck_schedule::{next_occurrence, validate, ExpectedOccurrence};

use crate::check::CheckDefinition;
use crate::context::{CallContext, CallError};
use crate::error::{MonitorError, Stage};

/// Provider-side objects backing one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentHandle {
    pub service: Service,
    pub escalation_policy: EscalationPolicy,
    pub incident: Incident,
}

/// Result of arming a check's incident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Armed {
    pub handle: IncidentHandle,
    /// The occurrence the snooze covers.
    pub occurrence: ExpectedOccurrence,
    pub snoozed_until: DateTime<Utc>,
}

/// Drives an [`AlertProvider`] from schedule evaluation results.
pub struct IncidentOrchestrator {
    provider: Arc<dyn AlertProvider>,
    clock: Arc<dyn TimeSource>,
}

impl IncidentOrchestrator {
    pub fn new(provider: Arc<dyn AlertProvider>, clock: Arc<dyn TimeSource>) -> Self {
        Self { provider, clock }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Arm the check's incident for the wait until its next occurrence.
    ///
    /// Run once at process start so a restarted watchdog does not fire for
    /// checks that have not missed anything.
    pub async fn setup(&self, ctx: &CallContext, check: &CheckDefinition) -> Result<Armed, MonitorError> {
        let handle = self.resolve_handle(ctx, check).await?;

        let now = self.clock.now();
        let (occurrence, wait) = next_occurrence(now, &check.schedule).map_err(|source| {
            MonitorError::InvalidSchedule {
                check_id: check.id.clone(),
                source,
            }
        })?;

        self.snooze(ctx, check, &handle, now, wait).await?;
        let snoozed_until = occurrence.instant;

        tracing::info!(
            check_id = %check.id,
            service_id = %handle.service.id,
            incident_id = %handle.incident.id,
            next = %occurrence.instant.to_rfc3339(),
            wait = %format_duration(wait),
            "check armed"
        );
        Ok(Armed {
            handle,
            occurrence,
            snoozed_until,
        })
    }

    /// Accept a check-in observed now and arm the following occurrence.
    ///
    /// The check-in is judged against the next occurrence after now. One
    /// outside that window is rejected and the snooze is left alone, so the
    /// provider escalates when it lapses.
    /// Returns the instant the next check-in is expected.
    pub async fn check_in(&self, ctx: &CallContext, check: &CheckDefinition) -> Result<DateTime<Utc>, MonitorError> {
        let handle = self.resolve_handle(ctx, check).await?;

        let now = self.clock.now();
        let invalid = |source| MonitorError::InvalidSchedule {
            check_id: check.id.clone(),
            source,
        };
        let (expected, _) = next_occurrence(now, &check.schedule).map_err(invalid)?;

        if let Err(source) = validate(now, &expected) {
            tracing::warn!(
                check_id = %check.id,
                incident_id = %handle.incident.id,
                expected = %source.expected.to_rfc3339(),
                observed = %now.to_rfc3339(),
                delta_seconds = source.delta.num_seconds(),
                "check-in outside tolerance, snooze not renewed"
            );
            return Err(MonitorError::OutOfTolerance {
                check_id: check.id.clone(),
                source,
            });
        }

        // Cover runs to the occurrence after the one just satisfied.
        let (following, _) = next_occurrence(expected.instant, &check.schedule).map_err(invalid)?;
        let wait = (following.instant - now).to_std().unwrap_or_default();
        self.snooze(ctx, check, &handle, now, wait).await?;

        tracing::info!(
            check_id = %check.id,
            service_id = %handle.service.id,
            incident_id = %handle.incident.id,
            satisfied = %expected.instant.to_rfc3339(),
            next = %following.instant.to_rfc3339(),
            "check-in accepted"
        );
        Ok(following.instant)
    }

    /// Resolve the check's standing incident.
    ///
    /// Maintenance only: a resolved incident no longer escalates, and the next
    /// setup or check-in opens a fresh one.
    pub async fn resolve(&self, ctx: &CallContext, check: &CheckDefinition) -> Result<IncidentHandle, MonitorError> {
        let handle = self.resolve_handle(ctx, check).await?;
        self.call(ctx, check, Stage::Resolve, self.provider.resolve_incident(&handle.incident))
            .await?;
        tracing::info!(
            check_id = %check.id,
            service_id = %handle.service.id,
            incident_id = %handle.incident.id,
            "incident resolved"
        );
        Ok(handle)
    }

    /// Resolve the incident, then delete the check's service.
    pub async fn teardown(&self, ctx: &CallContext, check: &CheckDefinition) -> Result<(), MonitorError> {
        let handle = self.resolve(ctx, check).await?;
        self.call(ctx, check, Stage::DeleteService, self.provider.delete_service(&handle.service))
            .await?;
        tracing::info!(check_id = %check.id, service_id = %handle.service.id, "service deleted");
        Ok(())
    }

    /// Look up the policy, then find or create the service and incident for `check`.
    ///
    /// The policy goes first because a new service must be routed to its id.
    async fn resolve_handle(&self, ctx: &CallContext, check: &CheckDefinition) -> Result<IncidentHandle, MonitorError> {
        let policy_key = check.alert.escalation_policy.as_str();
        let escalation_policy = self
            .call(
                ctx,
                check,
                Stage::EscalationPolicy,
                self.provider.find_escalation_policy(policy_key),
            )
            .await
            .map_err(|e| match e {
                MonitorError::ProviderUnavailable { source, .. } if source.is_not_found() => {
                    MonitorError::PolicyNotFound {
                        check_id: check.id.clone(),
                        policy: policy_key.to_string(),
                    }
                }
                other => other,
            })?;

        let service = self
            .call(
                ctx,
                check,
                Stage::Service,
                self.provider.find_or_create_service(&check.name, &escalation_policy),
            )
            .await?;

        let incident = self
            .call(
                ctx,
                check,
                Stage::Incident,
                self.provider.find_or_create_incident(&service, &escalation_policy),
            )
            .await?;

        tracing::debug!(
            check_id = %check.id,
            service_id = %service.id,
            service_name = %service.name,
            incident_id = %incident.id,
            "using incident"
        );
        Ok(IncidentHandle {
            service,
            escalation_policy,
            incident,
        })
    }

    async fn snooze(
        &self,
        ctx: &CallContext,
        check: &CheckDefinition,
        handle: &IncidentHandle,
        from: DateTime<Utc>,
        wait: Duration,
    ) -> Result<(), MonitorError> {
        self.call(
            ctx,
            check,
            Stage::Snooze,
            self.provider
                .snooze_incident(&handle.incident, &handle.service, from, wait),
        )
        .await
    }

    /// Run one provider call under `ctx`, tagging failures with the stage.
    async fn call<T, F>(&self, ctx: &CallContext, check: &CheckDefinition, stage: Stage, call: F) -> Result<T, MonitorError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        ctx.run(call).await.map_err(|e| match e {
            CallError::Cancelled => {
                tracing::warn!(check_id = %check.id, %stage, provider = self.provider_name(), "provider call cancelled");
                MonitorError::Cancelled {
                    check_id: check.id.clone(),
                    stage,
                }
            }
            CallError::Provider(source) => {
                tracing::warn!(
                    check_id = %check.id,
                    %stage,
                    provider = self.provider_name(),
                    error = %source,
                    "provider call failed"
                );
                MonitorError::ProviderUnavailable {
                    check_id: check.id.clone(),
                    stage,
                    source,
                }
            }
        })
    }
}
