use std::fmt;

use deadcheck_provider::ProviderError;
use deadcheck_schedule::{InvalidScheduleError, OutOfToleranceError};

/// Step of an orchestration call, reported with every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Service,
    EscalationPolicy,
    Incident,
    Schedule,
    Validation,
    Snooze,
    Resolve,
    DeleteService,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Service => "service",
            Stage::EscalationPolicy => "escalation_policy",
            Stage::Incident => "incident",
            Stage::Schedule => "schedule",
            Stage::Validation => "validation",
            Stage::Snooze => "snooze",
            Stage::Resolve => "resolve",
            Stage::DeleteService => "delete_service",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("check '{check_id}': invalid schedule: {source}")]
    InvalidSchedule {
        check_id: String,
        #[source]
        source: InvalidScheduleError,
    },

    #[error("check '{check_id}': {source}")]
    OutOfTolerance {
        check_id: String,
        #[source]
        source: OutOfToleranceError,
    },

    #[error("check '{check_id}': escalation policy '{policy}' not found")]
    PolicyNotFound { check_id: String, policy: String },

    #[error("check '{check_id}': provider unavailable during {stage}: {source}")]
    ProviderUnavailable {
        check_id: String,
        stage: Stage,
        #[source]
        source: ProviderError,
    },

    #[error("check '{check_id}': cancelled during {stage}")]
    Cancelled { check_id: String, stage: Stage },

    #[error("check '{check_id}': no alert provider configured")]
    MissingAlert { check_id: String },
}

impl MonitorError {
    pub fn check_id(&self) -> &str {
        match self {
            MonitorError::InvalidSchedule { check_id, .. }
            | MonitorError::OutOfTolerance { check_id, .. }
            | MonitorError::PolicyNotFound { check_id, .. }
            | MonitorError::ProviderUnavailable { check_id, .. }
            | MonitorError::Cancelled { check_id, .. }
            | MonitorError::MissingAlert { check_id } => check_id,
        }
    }

    /// The step that failed; `None` for configuration problems.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            MonitorError::InvalidSchedule { .. } => Some(Stage::Schedule),
            MonitorError::OutOfTolerance { .. } => Some(Stage::Validation),
            MonitorError::PolicyNotFound { .. } => Some(Stage::EscalationPolicy),
            MonitorError::ProviderUnavailable { stage, .. } | MonitorError::Cancelled { stage, .. } => {
                Some(*stage)
            }
            MonitorError::MissingAlert { .. } => None,
        }
    }

    /// Whether the same call may succeed if the caller tries again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MonitorError::ProviderUnavailable { .. })
    }
}
