//! Provider wiring and initial arming of every check.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use deadcheck_core::config::PagerDutyConfig;
use deadcheck_core::TimeSource;
use deadcheck_monitor::{CallContext, CheckDefinition, IncidentOrchestrator};
use deadcheck_provider::{AlertProvider, MemoryProvider, PagerDutyClient};

use crate::state::MonitoredCheck;

/// Pair every check with an orchestrator, sharing one provider per distinct
/// PagerDuty configuration.
///
/// PagerDuty credentials are verified before any check is armed. With
/// `dry_run` every check shares a single in-memory provider instead.
pub async fn build_monitored_checks(
    definitions: Vec<CheckDefinition>,
    clock: Arc<dyn TimeSource>,
    dry_run: bool,
) -> anyhow::Result<Vec<MonitoredCheck>> {
    if dry_run {
        let mut provider = MemoryProvider::new();
        for definition in &definitions {
            let policy = &definition.alert.escalation_policy;
            provider = provider.with_policy(policy, policy);
        }
        let orchestrator = Arc::new(IncidentOrchestrator::new(Arc::new(provider), clock));
        info!(checks = definitions.len(), "dry run: using in-memory alert provider");
        return Ok(definitions
            .into_iter()
            .map(|definition| MonitoredCheck {
                definition,
                orchestrator: orchestrator.clone(),
            })
            .collect());
    }

    let mut orchestrators: HashMap<PagerDutyConfig, Arc<IncidentOrchestrator>> = HashMap::new();
    let mut checks = Vec::with_capacity(definitions.len());
    for definition in definitions {
        let orchestrator = match orchestrators.get(&definition.alert) {
            Some(existing) => existing.clone(),
            None => {
                let provider = connect_pagerduty(&definition.alert, clock.clone())
                    .await
                    .with_context(|| format!("connecting PagerDuty for check '{}'", definition.id))?;
                let orchestrator = Arc::new(IncidentOrchestrator::new(provider, clock.clone()));
                orchestrators.insert(definition.alert.clone(), orchestrator.clone());
                orchestrator
            }
        };
        checks.push(MonitoredCheck {
            definition,
            orchestrator,
        });
    }
    info!(
        checks = checks.len(),
        providers = orchestrators.len(),
        "alert providers connected"
    );
    Ok(checks)
}

async fn connect_pagerduty(
    config: &PagerDutyConfig,
    clock: Arc<dyn TimeSource>,
) -> anyhow::Result<Arc<dyn AlertProvider>> {
    let client = PagerDutyClient::connect(config).await?.with_time_source(clock);
    info!(escalation_policy = %config.escalation_policy, "PagerDuty credentials verified");
    Ok(Arc::new(client))
}

/// Snooze every check's incident until its next occurrence.
///
/// Any failure aborts startup: a watchdog that cannot arm a check must not
/// pretend to watch it.
pub async fn arm_all(checks: &[MonitoredCheck], timeout: Duration) -> anyhow::Result<()> {
    for check in checks {
        let ctx = CallContext::background().with_timeout(timeout);
        let armed = check
            .orchestrator
            .setup(&ctx, &check.definition)
            .await
            .with_context(|| format!("arming check '{}'", check.definition.id))?;
        info!(
            check_id = %check.definition.id,
            incident_id = %armed.handle.incident.id,
            snoozed_until = %armed.snoozed_until.to_rfc3339(),
            "check ready"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use deadcheck_core::FixedTimeSource;
    use deadcheck_schedule::ScheduleSpec;

    fn definition(id: &str, policy: &str) -> CheckDefinition {
        CheckDefinition {
            id: id.to_string(),
            name: format!("{id}-job"),
            description: String::new(),
            schedule: ScheduleSpec::Interval {
                period: Duration::from_secs(600),
                tolerance: Duration::ZERO,
            },
            alert: PagerDutyConfig {
                api_key: "key".to_string(),
                escalation_policy: policy.to_string(),
                from: "oncall@example.com".to_string(),
                routing_key: None,
                base_url: None,
            },
        }
    }

    #[tokio::test]
    async fn dry_run_arms_every_check() {
        let clock = Arc::new(FixedTimeSource::new(Utc.with_ymd_and_hms(2026, 10, 19, 11, 0, 0).unwrap()));
        let checks = build_monitored_checks(
            vec![definition("a", "PPOLICY"), definition("b", "Finance")],
            clock,
            true,
        )
        .await
        .unwrap();

        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].orchestrator.provider_name(), "memory");
        arm_all(&checks, Duration::from_secs(5)).await.unwrap();
    }
}
