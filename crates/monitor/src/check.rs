//! Checks as the orchestrator sees them: config plus a validated schedule.

use deadcheck_core::config::{CheckConfig, PagerDutyConfig};
use deadcheck_core::Config;
use deadcheck_schedule::ScheduleSpec;

use crate::error::MonitorError;

/// A monitored job. Read-only for the lifetime of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckDefinition {
    pub id: String,
    /// Also the provider-side service name.
    pub name: String,
    pub description: String,
    pub schedule: ScheduleSpec,
    pub alert: PagerDutyConfig,
}

impl CheckDefinition {
    pub fn from_config(config: &Config, check: &CheckConfig) -> Result<Self, MonitorError> {
        let schedule = ScheduleSpec::from_config(&check.schedule).map_err(|source| {
            MonitorError::InvalidSchedule {
                check_id: check.id.clone(),
                source,
            }
        })?;
        let alert = config
            .pagerduty_for(check)
            .cloned()
            .ok_or_else(|| MonitorError::MissingAlert {
                check_id: check.id.clone(),
            })?;

        Ok(Self {
            id: check.id.clone(),
            name: check.name.clone(),
            description: check.description.clone(),
            schedule,
            alert,
        })
    }

    /// Every check in `config`, failing on the first invalid one.
    pub fn all_from_config(config: &Config) -> Result<Vec<Self>, MonitorError> {
        config
            .checks
            .iter()
            .map(|check| Self::from_config(config, check))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
checks:
  - id: nightly
    name: nightly-batch
    schedule:
      every: 24h
  - id: settlement
    name: settlement-file
    schedule:
      bankingDays:
        timezone: America/New_York
        calendar: us-federal-reserve
        times:
          - at: "09:00"
            tolerance: 15m
    alert:
      pagerduty:
        apiKey: other-key
        escalationPolicy: PFINANCE
        from: finance@example.com
alert:
  pagerduty:
    apiKey: key
    escalationPolicy: PPOLICY
    from: oncall@example.com
"#;

    #[test]
    fn builds_every_check_with_its_alert() {
        let config = Config::from_yaml_str(YAML).unwrap();
        let checks = CheckDefinition::all_from_config(&config).unwrap();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].alert.escalation_policy, "PPOLICY");
        assert_eq!(checks[0].schedule.kind(), "interval");
        assert_eq!(checks[1].alert.escalation_policy, "PFINANCE");
        assert_eq!(checks[1].schedule.kind(), "banking-days");
    }

    #[test]
    fn invalid_schedule_names_the_check() {
        let yaml = YAML.replace("every: 24h", "every: 0s");
        let config = Config::from_yaml_str(&yaml).unwrap();
        let err = CheckDefinition::all_from_config(&config).unwrap_err();
        assert_eq!(err.check_id(), "nightly");
        assert!(matches!(err, MonitorError::InvalidSchedule { .. }));
    }
}
