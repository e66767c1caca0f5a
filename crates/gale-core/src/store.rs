use crate::error::StoreError;
use crate::types::Lifecycle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Object store
// ---------------------------------------------------------------------------
//
// The engine never talks to a real control plane. It sees jobs through this
// trait: list what exists for a scenario, read one record, and leave the
// writes (with optimistic concurrency) to whoever owns the transport.

/// Last-observed state of one job spawned by an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Job name; matches the owning action's name for single-instance
    /// actions, or carries an instance suffix for fan-out actions.
    pub name: String,

    pub lifecycle: Lifecycle,
}

/// Narrowing predicate for [`ObjectStore::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub scenario: String,
}

impl Selector {
    pub fn scenario(name: &str) -> Self {
        Selector {
            scenario: name.to_string(),
        }
    }
}

pub trait ObjectStore {
    fn list(&self, selector: &Selector) -> Result<Vec<JobRecord>, StoreError>;

    fn get(&self, scenario: &str, name: &str) -> Result<JobRecord, StoreError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store with versioned writes. Backs tests and the CLI's offline
/// evaluation; a production embedder brings its own [`ObjectStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: BTreeMap<(String, String), (u64, JobRecord)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record unconditionally, resetting its version.
    pub fn insert(&mut self, scenario: &str, record: JobRecord) {
        self.objects
            .insert((scenario.to_string(), record.name.clone()), (1, record));
    }

    pub fn version(&self, scenario: &str, name: &str) -> Result<u64, StoreError> {
        self.objects
            .get(&(scenario.to_string(), name.to_string()))
            .map(|(version, _)| *version)
            .ok_or_else(|| StoreError::NotFound(format!("{scenario}/{name}")))
    }

    /// Compare-and-swap update of a job's lifecycle. The write is rejected
    /// when someone else bumped the version since `expected_version` was
    /// read; callers retry from a fresh read.
    pub fn update_lifecycle(
        &mut self,
        scenario: &str,
        name: &str,
        lifecycle: Lifecycle,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let key = (scenario.to_string(), name.to_string());
        let (version, record) = self
            .objects
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(format!("{scenario}/{name}")))?;

        if *version != expected_version {
            return Err(StoreError::Conflict {
                key: format!("{scenario}/{name}"),
                expected: expected_version,
                found: *version,
            });
        }

        record.lifecycle = lifecycle;
        *version += 1;
        Ok(*version)
    }
}

impl ObjectStore for MemoryStore {
    fn list(&self, selector: &Selector) -> Result<Vec<JobRecord>, StoreError> {
        Ok(self
            .objects
            .iter()
            .filter(|((scenario, _), _)| *scenario == selector.scenario)
            .map(|(_, (_, record))| record.clone())
            .collect())
    }

    fn get(&self, scenario: &str, name: &str) -> Result<JobRecord, StoreError> {
        self.objects
            .get(&(scenario.to_string(), name.to_string()))
            .map(|(_, record)| record.clone())
            .ok_or_else(|| StoreError::NotFound(format!("{scenario}/{name}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
