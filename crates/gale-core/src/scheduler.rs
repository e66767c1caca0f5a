use crate::action::SchedulerSpec;
use crate::distribution::Timeline;
use crate::error::{GaleError, Result, ScheduleError};
use crate::expr::StateReader;
use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------
//
// Resolves a scheduling policy against the clock and the owner's recorded
// state. The scheduler never sleeps and never spawns anything: it answers
// "should an instance fire now, and when should the caller look again", and
// the caller requeues itself accordingly.

/// Missed firings tolerated before the schedule is declared broken. Beyond
/// this the clock is skewed or the owner was gone for far too long, and
/// catching up would stampede.
const MAX_MISSED_RUNS: usize = 100;

/// Everything a policy decision may depend on, snapshotted by the caller.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleContext<'a> {
    /// Creation time of the owning scenario; the scan origin before any
    /// instance has fired.
    pub created_at: DateTime<Utc>,

    /// When the previous instance fired, if any.
    pub last_schedule_time: Option<DateTime<Utc>>,

    /// Precomputed firing instants, required by timeline policies.
    pub expected_timeline: Option<&'a Timeline>,

    pub now: DateTime<Utc>,
}

/// Outcome of resolving a policy at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    /// The most recent due instant that has not fired yet. `Some` means the
    /// caller should fire an instance now.
    pub missed: Option<DateTime<Utc>>,

    /// The next due instant after `now`, for requeueing. `None` for
    /// policies that are not clock-driven.
    pub next: Option<DateTime<Utc>>,
}

impl Eligibility {
    pub fn fire_now(&self) -> bool {
        self.missed.is_some()
    }
}

/// Resolves `spec` to a firing decision at `ctx.now`.
pub fn next_eligible_time(
    spec: &SchedulerSpec,
    ctx: &ScheduleContext<'_>,
    state: &dyn StateReader,
) -> Result<Eligibility> {
    if spec.sequential {
        return Ok(Eligibility {
            missed: Some(ctx.now),
            next: None,
        });
    }

    if let Some(cron_expr) = spec.cron.as_deref() {
        return cron_eligibility(cron_expr, spec.starting_deadline_seconds, ctx);
    }

    if let Some(condition) = spec.event.as_ref() {
        let satisfied = condition.is_satisfied(state)?;
        return Ok(Eligibility {
            missed: satisfied.then_some(ctx.now),
            next: None,
        });
    }

    if spec.timeline.is_some() {
        return timeline_eligibility(spec.starting_deadline_seconds, ctx);
    }

    // No policy at all: fire immediately, exactly once. The exactly-one
    // admission check keeps user-provided specs out of this branch.
    Ok(Eligibility {
        missed: Some(ctx.now),
        next: None,
    })
}

// ---------------------------------------------------------------------------
// Cron
// ---------------------------------------------------------------------------

/// Parses a cron rule. Accepts the standard 5-field form and `@` macros;
/// the 5-field form gets a seconds column of 0 prepended because the parser
/// wants one.
fn parse_cron(expr: &str) -> Result<Schedule> {
    let normalized = if !expr.starts_with('@') && expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };

    Schedule::from_str(&normalized).map_err(|err| {
        GaleError::from(ScheduleError::UnparseableCron {
            expr: expr.to_string(),
            reason: err.to_string(),
        })
    })
}

fn cron_eligibility(
    cron_expr: &str,
    deadline_seconds: Option<i64>,
    ctx: &ScheduleContext<'_>,
) -> Result<Eligibility> {
    let schedule = parse_cron(cron_expr)?;

    // Scan forward from the last firing (or creation), counting due instants
    // that were never acted on. The scan is exclusive of its origin, so a
    // firing recorded exactly on a tick is not replayed.
    let earliest = ctx.last_schedule_time.unwrap_or(ctx.created_at);

    let mut missed = None;
    let mut missed_count = 0usize;
    for tick in schedule.after(&earliest) {
        if tick > ctx.now {
            break;
        }
        missed = Some(tick);
        missed_count += 1;
        if missed_count > MAX_MISSED_RUNS {
            return Err(ScheduleError::TooManyMissed.into());
        }
    }

    let next = schedule.after(&ctx.now).next();

    let Some(missed_at) = missed else {
        return Ok(Eligibility { missed: None, next });
    };

    check_deadline(missed_at, deadline_seconds, ctx.now)?;

    Ok(Eligibility {
        missed: Some(missed_at),
        next,
    })
}

/// A missed firing older than its grace period is a schedule violation,
/// whatever policy produced it.
fn check_deadline(
    missed_at: DateTime<Utc>,
    deadline_seconds: Option<i64>,
    now: DateTime<Utc>,
) -> Result<()> {
    if let Some(deadline) = deadline_seconds {
        let expired_at = missed_at + Duration::seconds(deadline);
        if expired_at < now {
            return Err(ScheduleError::DeadlineExceeded {
                deadline_seconds: deadline,
                expired_at,
            }
            .into());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

fn timeline_eligibility(
    deadline_seconds: Option<i64>,
    ctx: &ScheduleContext<'_>,
) -> Result<Eligibility> {
    let timeline = ctx
        .expected_timeline
        .ok_or(ScheduleError::MissingTimeline)?;

    let origin = ctx.last_schedule_time.unwrap_or(ctx.created_at);
    match timeline.next(origin) {
        Some(due) if due <= ctx.now => {
            check_deadline(due, deadline_seconds, ctx.now)?;
            Ok(Eligibility {
                missed: Some(due),
                next: timeline.next(ctx.now),
            })
        }
        Some(due) => Ok(Eligibility {
            missed: None,
            next: Some(due),
        }),
        // Every instant has fired; the policy is exhausted.
        None => Ok(Eligibility {
            missed: None,
            next: None,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
