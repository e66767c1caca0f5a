use crate::action::{Action, Scenario, ScenarioStatus};
use crate::classifier::Classifier;
use crate::error::{GaleError, Result, StoreError};
use crate::scheduler::{self, ScheduleContext};
use crate::store::{ObjectStore, Selector};
use crate::types::{Lifecycle, Phase};
use chrono::{DateTime, Duration, Utc};

// ---------------------------------------------------------------------------
// Runtime dependency resolver
// ---------------------------------------------------------------------------
//
// One reconciliation pass: given the scenario document, its persisted status,
// and a fresh classifier over the observed jobs, decide which actions to hand
// off for execution now and when to look again. The resolver holds no state
// of its own; everything it knows arrives as arguments.

/// Outcome of one resolution pass.
#[derive(Debug)]
pub struct Resolution<'a> {
    /// Actions whose dependencies hold at this instant, in declaration
    /// order. The caller fires them and appends their names to
    /// `scheduled_jobs`.
    pub eligible: Vec<&'a Action>,

    /// Nearest time-gated dependency among the blocked actions. `None` when
    /// nothing is waiting on the clock; the caller then requeues only on
    /// state changes.
    pub requeue_after: Option<Duration>,
}

/// Builds a classifier over every job the store knows for `selector`.
/// Fresh per pass; never cache the result across reconciliations.
pub fn build_classifier(
    store: &dyn ObjectStore,
    selector: &Selector,
) -> std::result::Result<Classifier, StoreError> {
    let mut view = Classifier::new();
    for record in store.list(selector)? {
        view.classify(&record.name, &record.lifecycle);
    }
    Ok(view)
}

/// Decides which actions become eligible at `now`.
///
/// An action already in `scheduled_jobs` is never revisited. A Running
/// dependency on a job that has already completed is a hard error: the
/// condition can never hold again, so waiting for it would hang the
/// scenario forever. Actions carrying a scheduling policy are additionally
/// gated through the scheduler; a future firing feeds the requeue hint.
pub fn next_actions<'a>(
    scenario: &'a Scenario,
    status: &ScenarioStatus,
    state: &Classifier,
    now: DateTime<Utc>,
) -> Result<Resolution<'a>> {
    let mut resolution = Resolution {
        eligible: Vec::new(),
        requeue_after: None,
    };

    if scenario.suspend {
        return Ok(resolution);
    }

    'actions: for action in &scenario.actions {
        if status.scheduled_jobs.iter().any(|job| *job == action.name) {
            continue;
        }

        if let Some(wait) = action.depends_on.as_ref() {
            for dep in &wait.success {
                if !state.is_successful(std::slice::from_ref(dep)) {
                    continue 'actions;
                }
            }

            for dep in &wait.running {
                if state.is_running(std::slice::from_ref(dep)) {
                    continue;
                }
                if state.is_successful(std::slice::from_ref(dep))
                    || state.is_failed(std::slice::from_ref(dep))
                {
                    return Err(GaleError::RunningOnCompleted {
                        action: action.name.clone(),
                        dependency: dep.clone(),
                    });
                }
                // Still pending; look again on the next state change.
                continue 'actions;
            }

            if let Some(after) = wait.after_seconds {
                let due = scenario.created_at + Duration::seconds(after as i64);
                if now < due {
                    merge_requeue(&mut resolution.requeue_after, due - now);
                    continue;
                }
            }
        }

        if let Some(schedule) = action.schedule() {
            let ctx = ScheduleContext {
                created_at: scenario.created_at,
                last_schedule_time: status.last_schedule_time,
                expected_timeline: status.expected_timeline.as_ref(),
                now,
            };
            let eligibility = scheduler::next_eligible_time(schedule, &ctx, state)?;
            if !eligibility.fire_now() {
                if let Some(next) = eligibility.next {
                    if next > now {
                        merge_requeue(&mut resolution.requeue_after, next - now);
                    }
                }
                continue;
            }
        }

        resolution.eligible.push(action);
    }

    Ok(resolution)
}

fn merge_requeue(current: &mut Option<Duration>, candidate: Duration) {
    *current = Some(match *current {
        Some(existing) if existing <= candidate => existing,
        _ => candidate,
    });
}

// ---------------------------------------------------------------------------
// Scenario lifecycle assessment
// ---------------------------------------------------------------------------

/// Folds the classifier into the scenario's own lifecycle. Failure wins over
/// everything; success requires every action to have been scheduled and its
/// jobs to have succeeded.
pub fn assess_lifecycle(
    scenario: &Scenario,
    status: &ScenarioStatus,
    state: &Classifier,
) -> Lifecycle {
    if state.num_failed_jobs() > 0 {
        return Lifecycle {
            phase: Phase::Failed,
            reason: "JobHasFailed".to_string(),
            message: format!("failed jobs: {:?}", state.failed_list()),
            ..Default::default()
        };
    }

    let all_scheduled = status.scheduled_jobs.len() == scenario.actions.len();
    if all_scheduled && state.num_successful_jobs() == state.count() && state.count() > 0 {
        return Lifecycle {
            phase: Phase::Success,
            reason: "AllJobsCompleted".to_string(),
            ..Default::default()
        };
    }

    if state.num_active_jobs() > 0 {
        return Lifecycle {
            phase: Phase::Running,
            reason: "JobsInFlight".to_string(),
            ..Default::default()
        };
    }

    Lifecycle {
        phase: Phase::Pending,
        reason: "WaitingForJobs".to_string(),
        ..Default::default()
    }
}

/// Re-evaluates the assertion of every scheduled action. Returns the name of
/// the first action whose assertion no longer holds, in declaration order.
pub fn failed_assertion<'a>(
    scenario: &'a Scenario,
    status: &ScenarioStatus,
    state: &Classifier,
) -> Result<Option<&'a str>> {
    for action in &scenario.actions {
        if !status.scheduled_jobs.iter().any(|job| *job == action.name) {
            continue;
        }
        let Some(assert) = action.assert.as_ref() else {
            continue;
        };
        if !assert.is_satisfied(state)? {
            return Ok(Some(action.name.as_str()));
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
