use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// High-level summary of where a controllable resource is in its lifecycle.
///
/// Valid transitions:
/// Uninitialized -> Failed
/// Uninitialized -> Discoverable -> Pending -> Running* -> Success
/// Uninitialized -> Discoverable -> Pending -> Running* -> Failed
/// Running -> Chaos* -> Success
/// The asterisk marks phases that may repeat across reconciliation passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Phase {
    #[default]
    Uninitialized,
    Discoverable,
    Pending,
    Running,
    Success,
    Failed,
    Chaos,
}

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[
            Phase::Uninitialized,
            Phase::Discoverable,
            Phase::Pending,
            Phase::Running,
            Phase::Success,
            Phase::Failed,
            Phase::Chaos,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Uninitialized => "Uninitialized",
            Phase::Discoverable => "Discoverable",
            Phase::Pending => "Pending",
            Phase::Running => "Running",
            Phase::Success => "Success",
            Phase::Failed => "Failed",
            Phase::Chaos => "Chaos",
        }
    }

    /// True once the resource can make no further progress.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Success | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Uninitialized" | "" => Ok(Phase::Uninitialized),
            "Discoverable" => Ok(Phase::Discoverable),
            "Pending" => Ok(Phase::Pending),
            "Running" => Ok(Phase::Running),
            "Success" => Ok(Phase::Success),
            "Failed" => Ok(Phase::Failed),
            "Chaos" => Ok(Phase::Chaos),
            _ => Err(format!("invalid phase: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ActionType {
    /// Create a single service.
    Service,
    /// Create multiple services running in a shared context.
    Cluster,
    /// Inject a failure into the running system.
    Chaos,
    /// Inject multiple failures into the running system.
    Cascade,
    /// Delete previously created resources.
    Delete,
    /// Invoke a remote call on targeted services.
    Call,
}

impl ActionType {
    pub fn all() -> &'static [ActionType] {
        &[
            ActionType::Service,
            ActionType::Cluster,
            ActionType::Chaos,
            ActionType::Cascade,
            ActionType::Delete,
            ActionType::Call,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Service => "Service",
            ActionType::Cluster => "Cluster",
            ActionType::Chaos => "Chaos",
            ActionType::Cascade => "Cascade",
            ActionType::Delete => "Delete",
            ActionType::Call => "Call",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Phase plus context. Every controllable resource owns exactly one;
/// only the owner mutates it, everyone else reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lifecycle {
    #[serde(default)]
    pub phase: Phase,

    /// Brief CamelCase token describing why the resource is in this phase,
    /// e.g. "Evicted".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl Lifecycle {
    pub fn with_phase(phase: Phase) -> Self {
        Lifecycle {
            phase,
            ..Default::default()
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.phase == Phase::Failed {
            let reason = if self.reason.is_empty() {
                "check the logs"
            } else {
                &self.reason
            };
            write!(f, "phase:{} reason:{}", self.phase, reason)
        } else {
            write!(f, "phase:{}", self.phase)
        }
    }
}

// ---------------------------------------------------------------------------
// ConditionalExpr
// ---------------------------------------------------------------------------

/// A predicate over runtime state, used to gate suspension, assertions, and
/// event-driven scheduling. Needed because some scenarios run in infinite
/// horizons and the user must say when "done" or "broken" is reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalExpr {
    /// Templated boolean over classifier state, e.g.
    /// `{{.IsSuccessful "db"}} && {{.NumFailedJobs}} == 0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Structured metric-alert string, e.g.
    /// `avg() of query(wpFnYRwGk/2/bitrate, 15m, now) is below(14)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<String>,
}

impl ConditionalExpr {
    /// The zero value is vacuously true. Both sub-expressions must be absent;
    /// an expression with only one dialect set is still a real condition.
    pub fn is_zero(&self) -> bool {
        !self.has_state_expr() && !self.has_metrics_expr()
    }

    pub fn has_state_expr(&self) -> bool {
        self.state.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_metrics_expr(&self) -> bool {
        self.metrics.as_deref().is_some_and(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// WaitSpec
// ---------------------------------------------------------------------------

/// Dependencies that must hold before an action becomes eligible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitSpec {
    /// Wait for the given actions to be running.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub running: Vec<String>,

    /// Wait for the given actions to have succeeded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success: Vec<String>,

    /// Time offset since the creation of the scenario.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_seconds: Option<u64>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_roundtrip() {
        use std::str::FromStr;
        for phase in Phase::all() {
            let parsed = Phase::from_str(phase.as_str()).unwrap();
            assert_eq!(*phase, parsed);
        }
    }

    #[test]
    fn empty_phase_is_uninitialized() {
        use std::str::FromStr;
        assert_eq!(Phase::from_str("").unwrap(), Phase::Uninitialized);
        assert_eq!(Phase::default(), Phase::Uninitialized);
    }

    #[test]
    fn terminal_phases() {
        assert!(Phase::Success.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(!Phase::Running.is_terminal());
        assert!(!Phase::Chaos.is_terminal());
    }

    #[test]
    fn failed_lifecycle_display_includes_reason() {
        let lf = Lifecycle {
            phase: Phase::Failed,
            reason: "Evicted".to_string(),
            ..Default::default()
        };
        assert_eq!(lf.to_string(), "phase:Failed reason:Evicted");

        let lf = Lifecycle::with_phase(Phase::Failed);
        assert_eq!(lf.to_string(), "phase:Failed reason:check the logs");
    }

    #[test]
    fn conditional_expr_zero_requires_both_absent() {
        assert!(ConditionalExpr::default().is_zero());

        let state_only = ConditionalExpr {
            state: Some("{{.NumFailedJobs}} == 0".to_string()),
            metrics: None,
        };
        assert!(!state_only.is_zero());

        let metrics_only = ConditionalExpr {
            state: None,
            metrics: Some("avg() of query(a/1/m, 15m, now) is below(14)".to_string()),
        };
        assert!(!metrics_only.is_zero());
    }

    #[test]
    fn empty_strings_count_as_absent() {
        let expr = ConditionalExpr {
            state: Some(String::new()),
            metrics: Some(String::new()),
        };
        assert!(expr.is_zero());
    }

    #[test]
    fn action_type_serde_names() {
        let yaml = serde_yaml::to_string(&ActionType::Cascade).unwrap();
        assert_eq!(yaml.trim(), "Cascade");
        let parsed: ActionType = serde_yaml::from_str("Delete").unwrap();
        assert_eq!(parsed, ActionType::Delete);
    }
}
