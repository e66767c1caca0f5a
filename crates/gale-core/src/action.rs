use crate::distribution::{DistributionSpec, Timeline};
use crate::error::SpecError;
use crate::types::{ActionType, ConditionalExpr, Lifecycle, WaitSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Scheduling policy
// ---------------------------------------------------------------------------

/// Timeline policy: spread N instances over a total duration according to a
/// probability distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSpec {
    pub distribution: DistributionSpec,
    pub total_duration_seconds: u64,
}

/// When and in what proportion recurring or multi-instance actions fire.
/// Exactly one policy must be set; enforced at admission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSpec {
    /// Fire the next instance as soon as the previous one is accounted for.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sequential: bool,

    /// Standard 5-field cron rule, e.g. "0 * * * *", or a macro like "@hourly".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,

    /// Fire when the condition becomes true against the current state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<ConditionalExpr>,

    /// Fire along a precomputed probability timeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<TimelineSpec>,

    /// Grace period for starting a missed firing. If the missed time plus
    /// this deadline has already elapsed, the schedule is violated (fatal).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_deadline_seconds: Option<i64>,
}

impl SchedulerSpec {
    /// Enforces the exactly-one invariant over the policy branches.
    pub fn check_exactly_one(&self, action: &str) -> Result<(), SpecError> {
        let branches = usize::from(self.sequential)
            + usize::from(self.cron.is_some())
            + usize::from(self.event.is_some())
            + usize::from(self.timeline.is_some());

        if branches != 1 {
            return Err(SpecError::AmbiguousSchedule {
                action: action.to_string(),
            });
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Type-specific payloads
// ---------------------------------------------------------------------------

/// Reference to an externally defined workload template. Template resolution
/// and manifest construction are the caller's business; the engine only
/// needs the reference and the instance count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFromTemplate {
    pub template_ref: String,

    #[serde(default = "default_instances")]
    pub instances: u64,
}

fn default_instances() -> u64 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementSpec {
    /// Place all instances on the same node.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub collocate: bool,

    /// Never share a node with the jobs of these actions. May reference only
    /// Service and Cluster actions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(flatten)]
    pub generate_from_template: GenerateFromTemplate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<PlacementSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<SchedulerSpec>,

    /// Spread a total resource budget over the instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceDistributionSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeSpec {
    #[serde(flatten)]
    pub generate_from_template: GenerateFromTemplate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<SchedulerSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteSpec {
    /// Names of previously created actions whose resources are deleted.
    pub jobs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSpec {
    /// Name of the callable to invoke, as declared by the target template.
    pub callable: String,

    /// Services targeted by the call.
    pub services: Vec<String>,
}

/// Total resource budget to be distributed over a cluster's instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDistributionSpec {
    pub distribution: DistributionSpec,
    pub total: ResourceRequest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequest {
    #[serde(default)]
    pub cpu_millis: i64,
    #[serde(default)]
    pub memory_mb: i64,
    #[serde(default)]
    pub storage_mb: i64,
}

/// Exactly one slot must be populated and must match the action's type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedActions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<GenerateFromTemplate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chaos: Option<GenerateFromTemplate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascade: Option<CascadeSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<DeleteSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<CallSpec>,
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One step of a scenario. Created whole at admission; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Unique within the scenario. Must be a DNS-1123 subdomain, since it
    /// seeds the names of addressable child resources.
    pub name: String,

    #[serde(rename = "action")]
    pub action_type: ActionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<WaitSpec>,

    /// Condition that must keep holding after the action has started. A
    /// false evaluation aborts the scenario.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assert: Option<ConditionalExpr>,

    #[serde(flatten)]
    pub payload: EmbedActions,
}

impl Action {
    /// The scheduling policy attached to this action's payload, if any.
    pub fn schedule(&self) -> Option<&SchedulerSpec> {
        match self.action_type {
            ActionType::Cluster => self.payload.cluster.as_ref()?.schedule.as_ref(),
            ActionType::Cascade => self.payload.cascade.as_ref()?.schedule.as_ref(),
            _ => None,
        }
    }

    /// Number of child instances this action fans out to.
    pub fn instances(&self) -> u64 {
        match self.action_type {
            ActionType::Cluster => self
                .payload
                .cluster
                .as_ref()
                .map_or(1, |c| c.generate_from_template.instances),
            ActionType::Cascade => self
                .payload
                .cascade
                .as_ref()
                .map_or(1, |c| c.generate_from_template.instances),
            _ => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// An ordered list of actions plus scheduling state. The document arrives
/// via a create/update admission request and is validated before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: String,

    /// Assigned at admission when the document does not carry one.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    pub actions: Vec<Action>,

    /// Suspend subsequent executions; does not apply to started ones.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suspend: bool,
}

impl Scenario {
    pub fn from_yaml(doc: &str) -> crate::error::Result<Self> {
        Ok(serde_yaml::from_str(doc)?)
    }
}

/// Observed state, recomputed by the engine and persisted by the caller with
/// optimistic concurrency. This is the only state that crosses
/// reconciliation boundaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStatus {
    #[serde(flatten)]
    pub lifecycle: Lifecycle,

    /// Names of actions already handed off for execution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scheduled_jobs: Vec<String>,

    /// Running counter of job instances created across all passes.
    #[serde(default)]
    pub queued_jobs: u64,

    /// Cached evaluation of a timeline distribution. Reconciliation may
    /// restart, so the slice is computed once and read from here after.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_timeline: Option<Timeline>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_schedule_time: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::DistributionName;

    fn service(name: &str) -> Action {
        Action {
            name: name.to_string(),
            action_type: ActionType::Service,
            depends_on: None,
            assert: None,
            payload: EmbedActions {
                service: Some(GenerateFromTemplate {
                    template_ref: "templates/webserver".to_string(),
                    instances: 1,
                }),
                ..Default::default()
            },
        }
    }

    #[test]
    fn scenario_yaml_roundtrip() {
        let scenario = Scenario {
            name: "smoke".to_string(),
            created_at: Utc::now(),
            actions: vec![service("db")],
            suspend: false,
        };
        let yaml = serde_yaml::to_string(&scenario).unwrap();
        assert!(yaml.contains("action: Service"));
        let parsed = Scenario::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, scenario);
    }

    #[test]
    fn scheduler_exactly_one_policy() {
        let spec = SchedulerSpec {
            cron: Some("@hourly".to_string()),
            ..Default::default()
        };
        assert!(spec.check_exactly_one("importers").is_ok());

        let none = SchedulerSpec::default();
        assert!(none.check_exactly_one("importers").is_err());

        let two = SchedulerSpec {
            sequential: true,
            cron: Some("@hourly".to_string()),
            ..Default::default()
        };
        assert!(two.check_exactly_one("importers").is_err());
    }

    #[test]
    fn schedule_lives_on_cluster_and_cascade_payloads() {
        let mut action = service("db");
        assert!(action.schedule().is_none());

        action.action_type = ActionType::Cluster;
        action.payload = EmbedActions {
            cluster: Some(ClusterSpec {
                generate_from_template: GenerateFromTemplate {
                    template_ref: "templates/webserver".to_string(),
                    instances: 5,
                },
                placement: None,
                schedule: Some(SchedulerSpec {
                    timeline: Some(TimelineSpec {
                        distribution: DistributionSpec {
                            name: DistributionName::Uniform,
                            pareto: None,
                        },
                        total_duration_seconds: 3600,
                    }),
                    ..Default::default()
                }),
                resources: None,
            }),
            ..Default::default()
        };
        assert!(action.schedule().is_some());
        assert_eq!(action.instances(), 5);
    }

    #[test]
    fn wait_spec_deserializes_from_camel_case() {
        let yaml = "running: [db]\nsuccess: [loader]\nafterSeconds: 60\n";
        let wait: WaitSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(wait.running, vec!["db"]);
        assert_eq!(wait.success, vec!["loader"]);
        assert_eq!(wait.after_seconds, Some(60));
    }
}
