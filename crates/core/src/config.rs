use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{ConfigError, Result};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

// ── Top-level config ──────────────────────────────────────────

/// The whole configuration document: monitored checks plus alerting credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    pub checks: Vec<CheckConfig>,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Read, env-resolve and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&raw)?;
        tracing::debug!(path = %path.display(), checks = config.checks.len(), "config file loaded");
        Ok(config)
    }

    /// Parse, env-resolve and validate a YAML document.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(raw)?;
        config.resolve_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Replace `${VAR}` references in provider credentials.
    fn resolve_env(&mut self) -> Result<()> {
        if let Some(pd) = self.alert.pagerduty.as_mut() {
            pd.resolve_env()?;
        }
        for check in &mut self.checks {
            if let Some(pd) = check.alert.as_mut().and_then(|a| a.pagerduty.as_mut()) {
                pd.resolve_env()?;
            }
        }
        Ok(())
    }

    /// Structural checks that do not depend on schedule semantics.
    ///
    /// Schedule contents (timezones, clock times, tolerances) are validated
    /// when the schedule model is built from [`ScheduleConfig`].
    pub fn validate(&self) -> Result<()> {
        if self.checks.is_empty() {
            return Err(ConfigError::Validation("no checks configured".to_string()));
        }

        let mut seen = HashSet::new();
        for check in &self.checks {
            if check.id.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "check '{}' has an empty id",
                    check.name
                )));
            }
            if !seen.insert(check.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate check id '{}'",
                    check.id
                )));
            }
            if self.pagerduty_for(check).is_none() {
                return Err(ConfigError::Validation(format!(
                    "check '{}' has no pagerduty alert configuration",
                    check.id
                )));
            }
            check.schedule.validate_durations()?;
        }
        Ok(())
    }

    /// Alert settings that apply to `check`: its own override, else the global section.
    pub fn pagerduty_for<'a>(&'a self, check: &'a CheckConfig) -> Option<&'a PagerDutyConfig> {
        check
            .alert
            .as_ref()
            .and_then(|a| a.pagerduty.as_ref())
            .or(self.alert.pagerduty.as_ref())
    }

    /// Look up a check by id.
    pub fn check(&self, id: &str) -> Option<&CheckConfig> {
        self.checks.iter().find(|c| c.id == id)
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded: {} check(s)", self.checks.len());
        for check in &self.checks {
            tracing::info!(
                "  check:       id={}, name={}, schedule={}",
                check.id,
                check.name,
                check.schedule.kind()
            );
        }
        if let Some(pd) = &self.alert.pagerduty {
            tracing::info!(
                "  pagerduty:   escalation_policy={}, from={}, api_key={}",
                pd.escalation_policy,
                pd.from,
                redact(&pd.api_key)
            );
        }
        tracing::info!(
            "  server:      bind={}, provider_timeout={}",
            self.server.bind_address,
            crate::duration::format_duration(self.server.provider_timeout)
        );
    }
}

// ── Checks ────────────────────────────────────────────────────

/// One monitored job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CheckConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub schedule: ScheduleConfig,
    /// Overrides the global alert section for this check only.
    #[serde(default)]
    pub alert: Option<AlertConfig>,
}

/// Raw schedule block. Exactly one of `every`, `weekdays`, `banking_days` is expected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScheduleConfig {
    #[serde(default, alias = "duration")]
    pub every: Option<String>,
    /// Tolerance for `every` schedules.
    #[serde(default)]
    pub tolerance: Option<String>,
    #[serde(default)]
    pub weekdays: Option<PartialDay>,
    #[serde(default)]
    pub banking_days: Option<BankingDays>,
}

impl ScheduleConfig {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match (&self.every, &self.weekdays, &self.banking_days) {
            (Some(_), None, None) => "interval",
            (None, Some(_), None) => "weekdays",
            (None, None, Some(_)) => "banking-days",
            (None, None, None) => "none",
            _ => "ambiguous",
        }
    }

    /// Every duration string in the block must parse.
    fn validate_durations(&self) -> Result<()> {
        let slots = self
            .weekdays
            .iter()
            .flat_map(|d| d.times.iter())
            .chain(self.banking_days.iter().flat_map(|b| b.times.iter()))
            .map(|t| t.tolerance.as_str());
        for raw in self.every.iter().chain(self.tolerance.iter()).map(String::as_str).chain(slots) {
            if parse_duration(raw).is_none() {
                return Err(ConfigError::InvalidDuration(raw.to_string()));
            }
        }
        Ok(())
    }
}

/// Times of day on Monday through Friday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialDay {
    pub timezone: String,
    pub times: Vec<Times>,
}

/// Times of day on banking days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BankingDays {
    pub timezone: String,
    /// Built-in holiday calendar, e.g. `us-federal-reserve`.
    #[serde(default)]
    pub calendar: Option<String>,
    /// Extra non-banking dates on top of the calendar.
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
    pub times: Vec<Times>,
}

/// A clock time (`HH:MM`) and how far either side of it a check-in may land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Times {
    pub at: String,
    pub tolerance: String,
}

// ── Alerting ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AlertConfig {
    #[serde(default)]
    pub pagerduty: Option<PagerDutyConfig>,
}

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PagerDutyConfig {
    pub api_key: String,
    /// Escalation policy id or name.
    pub escalation_policy: String,
    /// Email address of a valid user associated with the account making the request.
    pub from: String,
    #[serde(default)]
    pub routing_key: Option<String>,
    /// REST API root, defaults to the public PagerDuty endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl PagerDutyConfig {
    fn resolve_env(&mut self) -> Result<()> {
        self.api_key = resolve_env_vars(&self.api_key)?;
        self.from = resolve_env_vars(&self.from)?;
        if let Some(key) = self.routing_key.as_mut() {
            *key = resolve_env_vars(key)?;
        }
        if let Some(url) = self.base_url.as_mut() {
            *url = resolve_env_vars(url)?;
        }
        Ok(())
    }
}

impl fmt::Debug for PagerDutyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagerDutyConfig")
            .field("api_key", &redact(&self.api_key))
            .field("escalation_policy", &self.escalation_policy)
            .field("from", &self.from)
            .field("routing_key", &self.routing_key.as_deref().map(redact))
            .field("base_url", &self.base_url)
            .finish()
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Upper bound on provider work done for one request.
    #[serde(default = "default_provider_timeout", with = "crate::duration::serde_duration")]
    pub provider_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            provider_timeout: default_provider_timeout(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_provider_timeout() -> Duration {
    Duration::from_secs(30)
}

// ── Helpers ───────────────────────────────────────────────────

fn redact(secret: &str) -> String {
    let len = secret.chars().count();
    if len <= 4 {
        "****".to_string()
    } else {
        let tail: String = secret.chars().skip(len - 4).collect();
        format!("****{tail}")
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set.
pub fn resolve_env_vars(input: &str) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            // Consume the '{'
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(ConfigError::Validation(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| ConfigError::MissingEnv(var_name.clone()))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
checks:
  - id: nightly-upload
    name: Nightly upload
    description: Files pushed to the bank
    schedule:
      bankingDays:
        timezone: America/New_York
        calendar: us-federal-reserve
        holidays: ["2026-12-24"]
        times:
          - at: "09:30"
            tolerance: 15m
  - id: heartbeat
    name: Heartbeat
    schedule:
      every: 1h
alert:
  pagerduty:
    apiKey: ${DEADCHECK_TEST_API_KEY}
    escalationPolicy: PABC123
    from: ops@example.com
server:
  providerTimeout: 10s
"#;

    #[test]
    fn parses_full_document() {
        std::env::set_var("DEADCHECK_TEST_API_KEY", "u+secret-key");
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        std::env::remove_var("DEADCHECK_TEST_API_KEY");

        assert_eq!(config.checks.len(), 2);
        let upload = &config.checks[0];
        let banking = upload.schedule.banking_days.as_ref().unwrap();
        assert_eq!(banking.timezone, "America/New_York");
        assert_eq!(banking.calendar.as_deref(), Some("us-federal-reserve"));
        assert_eq!(banking.holidays, vec![NaiveDate::from_ymd_opt(2026, 12, 24).unwrap()]);
        assert_eq!(banking.times[0].at, "09:30");
        assert_eq!(upload.schedule.kind(), "banking-days");

        assert_eq!(config.checks[1].schedule.every.as_deref(), Some("1h"));
        assert_eq!(config.checks[1].schedule.kind(), "interval");

        let pd = config.pagerduty_for(upload).unwrap();
        assert_eq!(pd.api_key, "u+secret-key");
        assert_eq!(config.server.provider_timeout, Duration::from_secs(10));
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn duration_alias_is_accepted() {
        let raw = r#"
checks:
  - id: a
    name: A
    schedule:
      duration: 30m
alert:
  pagerduty: { apiKey: k, escalationPolicy: P1, from: a@b.c }
"#;
        let config = Config::from_yaml_str(raw).unwrap();
        assert_eq!(config.checks[0].schedule.every.as_deref(), Some("30m"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let raw = r#"
checks:
  - id: a
    name: A
    schedule: { every: 1h }
    surprise: true
alert:
  pagerduty: { apiKey: k, escalationPolicy: P1, from: a@b.c }
"#;
        assert!(matches!(Config::from_yaml_str(raw), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn duplicate_ids_fail_validation() {
        let raw = r#"
checks:
  - { id: a, name: A, schedule: { every: 1h } }
  - { id: a, name: B, schedule: { every: 2h } }
alert:
  pagerduty: { apiKey: k, escalationPolicy: P1, from: a@b.c }
"#;
        match Config::from_yaml_str(raw) {
            Err(ConfigError::Validation(msg)) => assert!(msg.contains("duplicate")),
            other => panic!("expected Validation error, got: {other:?}"),
        }
    }

    #[test]
    fn check_without_alert_fails_validation() {
        let raw = r#"
checks:
  - { id: a, name: A, schedule: { every: 1h } }
"#;
        match Config::from_yaml_str(raw) {
            Err(ConfigError::Validation(msg)) => assert!(msg.contains("no pagerduty")),
            other => panic!("expected Validation error, got: {other:?}"),
        }
    }

    #[test]
    fn unparseable_tolerance_fails_validation() {
        let raw = r#"
checks:
  - id: a
    name: A
    schedule:
      weekdays:
        timezone: UTC
        times: [{ at: "12:00", tolerance: "5 minutes" }]
alert:
  pagerduty: { apiKey: k, escalationPolicy: P1, from: a@b.c }
"#;
        match Config::from_yaml_str(raw) {
            Err(ConfigError::InvalidDuration(raw)) => assert_eq!(raw, "5 minutes"),
            other => panic!("expected InvalidDuration error, got: {other:?}"),
        }
    }

    #[test]
    fn check_level_alert_overrides_global() {
        let raw = r#"
checks:
  - id: a
    name: A
    schedule: { every: 1h }
    alert:
      pagerduty: { apiKey: other, escalationPolicy: P2, from: x@y.z }
  - { id: b, name: B, schedule: { every: 1h } }
alert:
  pagerduty: { apiKey: k, escalationPolicy: P1, from: a@b.c }
"#;
        let config = Config::from_yaml_str(raw).unwrap();
        assert_eq!(config.pagerduty_for(&config.checks[0]).unwrap().escalation_policy, "P2");
        assert_eq!(config.pagerduty_for(&config.checks[1]).unwrap().escalation_policy, "P1");
    }

    #[test]
    fn missing_env_var_is_reported() {
        let raw = r#"
checks:
  - { id: a, name: A, schedule: { every: 1h } }
alert:
  pagerduty: { apiKey: "${ABSOLUTELY_NOT_SET_12345}", escalationPolicy: P1, from: a@b.c }
"#;
        match Config::from_yaml_str(raw) {
            Err(ConfigError::MissingEnv(name)) => assert_eq!(name, "ABSOLUTELY_NOT_SET_12345"),
            other => panic!("expected MissingEnv error, got: {other:?}"),
        }
    }

    #[test]
    fn resolve_env_vars_unclosed() {
        match resolve_env_vars("token-${UNCLOSED") {
            Err(ConfigError::Validation(msg)) => assert!(msg.contains("unclosed")),
            other => panic!("expected Validation error, got: {other:?}"),
        }
    }

    #[test]
    fn resolve_env_vars_no_vars() {
        assert_eq!(resolve_env_vars("plain-value").unwrap(), "plain-value");
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let pd = PagerDutyConfig {
            api_key: "u+abcdefghijkl".to_string(),
            escalation_policy: "P1".to_string(),
            from: "a@b.c".to_string(),
            routing_key: None,
            base_url: None,
        };
        let rendered = format!("{pd:?}");
        assert!(!rendered.contains("abcdefgh"));
        assert!(rendered.contains("****ijkl"));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "checks:\n  - {{ id: a, name: A, schedule: {{ every: 1h }} }}\nalert:\n  pagerduty: {{ apiKey: k, escalationPolicy: P1, from: a@b.c }}"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.checks[0].id, "a");
        assert!(config.check("a").is_some());
        assert!(config.check("missing").is_none());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        assert!(matches!(
            Config::load("/definitely/not/here/deadcheck.yaml"),
            Err(ConfigError::Io(_))
        ));
    }
}
