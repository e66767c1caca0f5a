use crate::action::{Action, Scenario};
use crate::distribution::{self, DistributionName, DistributionSpec};
use crate::error::SpecError;
use crate::expr;
use crate::registry::KindRegistry;
use crate::types::ActionType;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Dependency graph
// ---------------------------------------------------------------------------
//
// Built in a single left-to-right pass over the action list. An action may
// only reference actions declared before it, which makes the declaration
// order a topological order and rules out cycles without a separate search.

const MAX_NAME_LEN: usize = 253;

fn dns1123_subdomain() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
            .expect("name pattern must compile")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// The action waits for the dependency to be running.
    Running,
    /// The action waits for the dependency to have succeeded.
    Success,
    /// The action deletes the dependency's resources.
    Delete,
    /// The action's placement must avoid the dependency's nodes.
    Conflict,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Running => "running",
            EdgeKind::Success => "success",
            EdgeKind::Delete => "delete",
            EdgeKind::Conflict => "conflict",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// The later action, the one that depends.
    pub action: String,
    /// The earlier action it points back to.
    pub dependency: String,
    pub kind: EdgeKind,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    order: Vec<String>,
    kinds: HashMap<String, ActionType>,
    edges: Vec<Edge>,
}

impl DependencyGraph {
    /// Action names in declaration order, which is also topological order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<ActionType> {
        self.kinds.get(name).copied()
    }

    /// Later actions holding an edge back to `name`.
    pub fn dependents_of(&self, name: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.dependency == name).collect()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn check_name(name: &str) -> Result<(), SpecError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(SpecError::InvalidName {
            name: name.to_string(),
            reason: format!("must be 1 to {MAX_NAME_LEN} characters"),
        });
    }
    if !dns1123_subdomain().is_match(name) {
        return Err(SpecError::InvalidName {
            name: name.to_string(),
            reason: "must be a lowercase DNS-1123 subdomain".to_string(),
        });
    }
    Ok(())
}

/// Validates one action against everything declared before it and extends
/// the graph. Only backward references are legal for every edge kind.
fn admit_action(graph: &mut DependencyGraph, action: &Action) -> Result<(), SpecError> {
    check_name(&action.name)?;

    if graph.contains(&action.name) {
        return Err(SpecError::DuplicateAction(action.name.clone()));
    }

    if let Some(wait) = action.depends_on.as_ref() {
        for (names, kind) in [
            (&wait.running, EdgeKind::Running),
            (&wait.success, EdgeKind::Success),
        ] {
            for dep in names {
                if !graph.contains(dep) {
                    return Err(SpecError::DanglingReference {
                        action: action.name.clone(),
                        dependency: dep.clone(),
                        kind: kind.as_str().to_string(),
                    });
                }
                graph.edges.push(Edge {
                    action: action.name.clone(),
                    dependency: dep.clone(),
                    kind,
                });
            }
        }
    }

    if let Some(delete) = action.payload.delete.as_ref() {
        for job in &delete.jobs {
            if !graph.contains(job) {
                return Err(SpecError::UnknownDeleteTarget {
                    action: action.name.clone(),
                    job: job.clone(),
                });
            }
            if graph.kind_of(job) == Some(ActionType::Delete) {
                return Err(SpecError::DeleteOnDelete {
                    action: action.name.clone(),
                    job: job.clone(),
                });
            }
            graph.edges.push(Edge {
                action: action.name.clone(),
                dependency: job.clone(),
                kind: EdgeKind::Delete,
            });
        }
    }

    let placement = action
        .payload
        .cluster
        .as_ref()
        .and_then(|c| c.placement.as_ref());
    if let Some(placement) = placement {
        for target in &placement.conflicts_with {
            match graph.kind_of(target) {
                Some(ActionType::Service) | Some(ActionType::Cluster) => {
                    graph.edges.push(Edge {
                        action: action.name.clone(),
                        dependency: target.clone(),
                        kind: EdgeKind::Conflict,
                    });
                }
                Some(_) => {
                    return Err(SpecError::InvalidConflictTarget {
                        action: action.name.clone(),
                        target: target.clone(),
                    })
                }
                None => {
                    return Err(SpecError::UnknownConflictTarget {
                        action: action.name.clone(),
                        target: target.clone(),
                    })
                }
            }
        }
    }

    graph.order.push(action.name.clone());
    graph.kinds.insert(action.name.clone(), action.action_type);
    Ok(())
}

/// Builds the dependency graph for a scenario, checking names, duplicates,
/// and reference targets. Payload and expression checks live in
/// [`validate_scenario`]; this is the structural half.
pub fn build_graph(scenario: &Scenario) -> Result<DependencyGraph, SpecError> {
    check_name(&scenario.name)?;

    let mut graph = DependencyGraph::default();
    for action in &scenario.actions {
        admit_action(&mut graph, action)?;
    }
    Ok(graph)
}

/// Rejects scenarios that would run forever. Every action must eventually
/// be accounted for: either some later action waits for its success, or a
/// Delete action tears it down, or it is itself a Delete (one-shot by
/// construction).
pub fn check_bounded_execution(
    scenario: &Scenario,
    graph: &DependencyGraph,
) -> Result<(), SpecError> {
    let mut terminated = BTreeSet::new();

    for edge in graph.edges() {
        if matches!(edge.kind, EdgeKind::Success | EdgeKind::Delete) {
            terminated.insert(edge.dependency.as_str());
        }
    }
    for action in &scenario.actions {
        if action.action_type == ActionType::Delete {
            terminated.insert(action.name.as_str());
        }
    }

    let unbounded: Vec<&str> = graph
        .order()
        .iter()
        .map(String::as_str)
        .filter(|name| !terminated.contains(name))
        .collect();

    if !unbounded.is_empty() {
        return Err(SpecError::UnboundedExecution(unbounded.join(", ")));
    }
    Ok(())
}

/// Full admission check: structure, payloads, scheduling policies, and
/// expression well-formedness, then the bounded-execution rule over the
/// finished graph.
pub fn validate_scenario(
    scenario: &Scenario,
    registry: &KindRegistry,
) -> Result<DependencyGraph, SpecError> {
    let graph = build_graph(scenario)?;

    for action in &scenario.actions {
        registry.check(action)?;

        if let Some(schedule) = action.schedule() {
            schedule.check_exactly_one(&action.name)?;

            if let Some(event) = schedule.event.as_ref() {
                expr::check_conditional(event).map_err(|source| SpecError::InvalidAssertion {
                    action: action.name.clone(),
                    source,
                })?;
            }

            if let Some(timeline) = schedule.timeline.as_ref() {
                check_distribution(action, &timeline.distribution)?;
            }
        }

        if let Some(resources) = action
            .payload
            .cluster
            .as_ref()
            .and_then(|c| c.resources.as_ref())
        {
            check_distribution(action, &resources.distribution)?;
        }

        if let Some(assert) = action.assert.as_ref() {
            expr::check_conditional(assert).map_err(|source| SpecError::InvalidAssertion {
                action: action.name.clone(),
                source,
            })?;
        }
    }

    check_bounded_execution(scenario, &graph)?;
    Ok(graph)
}

/// A declared distribution must evaluate over the action's instance count.
/// `default` forwards to a slice computed at runtime and is checked there.
fn check_distribution(action: &Action, spec: &DistributionSpec) -> Result<(), SpecError> {
    if spec.name == DistributionName::Default {
        return Ok(());
    }
    distribution::generate_probability_slice(action.instances(), spec).map_err(|err| {
        let reason = match err {
            crate::error::GaleError::Distribution(reason) => reason,
            other => other.to_string(),
        };
        SpecError::InvalidDistribution {
            action: action.name.clone(),
            reason,
        }
    })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
