use thiserror::Error;

// ---------------------------------------------------------------------------
// SpecError — admission-time rejections, surfaced to the user verbatim
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("invalid action name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("duplicate action '{0}'")]
    DuplicateAction(String),

    #[error("invalid {kind} dependency [{action}]<-[{dependency}]")]
    DanglingReference {
        action: String,
        dependency: String,
        kind: String,
    },

    #[error("empty {expected} definition for action '{action}'")]
    MissingPayload { action: String, expected: String },

    #[error("payload of action '{action}' does not match type '{expected}'")]
    MismatchedPayload { action: String, expected: String },

    #[error("referenced job '{job}' of action '{action}' does not exist")]
    UnknownDeleteTarget { action: String, job: String },

    #[error("cycle deletion: job '{job}' of action '{action}' is a deletion job")]
    DeleteOnDelete { action: String, job: String },

    #[error("placement of action '{action}' conflicts with '{target}', which is not a Service or Cluster")]
    InvalidConflictTarget { action: String, target: String },

    #[error("placement of action '{action}' conflicts with unknown action '{target}'")]
    UnknownConflictTarget { action: String, target: String },

    #[error("action '{action}' must declare exactly one scheduling policy")]
    AmbiguousSchedule { action: String },

    #[error("actions '{0}' are neither completed nor waited. this leads to unbounded execution")]
    UnboundedExecution(String),

    #[error("distribution of action '{action}' cannot be evaluated: {reason}")]
    InvalidDistribution { action: String, reason: String },

    #[error("invalid assertion for action '{action}': {source}")]
    InvalidAssertion {
        action: String,
        source: ExpressionError,
    },
}

// ---------------------------------------------------------------------------
// ScheduleError — fatal to the owning resource, never retried
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("unparseable schedule '{expr}': {reason}")]
    UnparseableCron { expr: String, reason: String },

    #[error("too many missed start times (> 100). set or decrease startingDeadlineSeconds or check clock skew")]
    TooManyMissed,

    #[error("scheduling violation: deadline of {deadline_seconds}s expired at {expired_at}")]
    DeadlineExceeded {
        deadline_seconds: i64,
        expired_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("timeline schedule requires an evaluated timeline on the owner's status")]
    MissingTimeline,
}

// ---------------------------------------------------------------------------
// ExpressionError — fatal to the dependent action or assertion
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("parse error in expression '{expr}': {reason}")]
    Parse { expr: String, reason: String },

    #[error("unknown accessor '{0}'")]
    UnknownAccessor(String),

    #[error("accessor '{accessor}' expects {expected}, got {got} argument(s)")]
    BadArity {
        accessor: String,
        expected: String,
        got: usize,
    },

    #[error("expected boolean result for '{expr}', got {got}")]
    NotBoolean { expr: String, got: String },

    #[error("type error in expression '{expr}': {reason}")]
    Type { expr: String, reason: String },

    #[error("erroneous metrics query '{0}'. example: 'avg() of query(wpFnYRwGk/2/bitrate, 15m, now) is below(14)'")]
    Format(String),
}

// ---------------------------------------------------------------------------
// StoreError — transient, retried by the caller via requeue
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("write conflict on '{key}': expected version {expected}, found {found}")]
    Conflict {
        key: String,
        expected: u64,
        found: u64,
    },
}

// ---------------------------------------------------------------------------
// GaleError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GaleError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("distribution error: {0}")]
    Distribution(String),

    #[error("action '{action}' has a Running dependency on completed job '{dependency}'")]
    RunningOnCompleted { action: String, dependency: String },

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GaleError>;
