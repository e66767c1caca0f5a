use crate::types::{Lifecycle, Phase};
use std::collections::BTreeMap;
use std::fmt::Write as _;

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Splits jobs into pending, running, successful, and failed buckets.
///
/// A classifier is a disposable, per-pass value: built from scratch at every
/// reconciliation cycle, queried, then discarded. It must never be stored on
/// a shared field, so concurrent reconciliations of different objects cannot
/// cross-contaminate.
///
/// The predicate and count method names are part of the expression
/// evaluator's accessor surface (`{{.IsRunning "db"}}` etc.) and must stay
/// stable.
#[derive(Debug, Default, Clone)]
pub struct Classifier {
    pending_jobs: BTreeMap<String, Lifecycle>,
    running_jobs: BTreeMap<String, Lifecycle>,
    successful_jobs: BTreeMap<String, Lifecycle>,
    failed_jobs: BTreeMap<String, Lifecycle>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.pending_jobs.clear();
        self.running_jobs.clear();
        self.successful_jobs.clear();
        self.failed_jobs.clear();
    }

    /// Ingests the last-observed lifecycle of `name`. Re-classifying a name
    /// overwrites the previous entry: last write wins within a pass.
    pub fn classify(&mut self, name: &str, lifecycle: &Lifecycle) {
        self.remove(name);

        match lifecycle.phase {
            // Not yet running, still counts as active work in flight.
            Phase::Uninitialized | Phase::Discoverable | Phase::Pending => {
                self.pending_jobs.insert(name.to_string(), lifecycle.clone());
            }
            // Chaos is "running under fault injection".
            Phase::Running | Phase::Chaos => {
                self.running_jobs.insert(name.to_string(), lifecycle.clone());
            }
            Phase::Success => {
                self.successful_jobs
                    .insert(name.to_string(), lifecycle.clone());
            }
            Phase::Failed => {
                self.failed_jobs.insert(name.to_string(), lifecycle.clone());
            }
        }
    }

    fn remove(&mut self, name: &str) {
        self.pending_jobs.remove(name);
        self.running_jobs.remove(name);
        self.successful_jobs.remove(name);
        self.failed_jobs.remove(name);
    }

    // -----------------------------------------------------------------------
    // Predicates — every listed name must be in the bucket
    // -----------------------------------------------------------------------

    pub fn is_pending<S: AsRef<str>>(&self, jobs: &[S]) -> bool {
        jobs.iter()
            .all(|j| self.pending_jobs.contains_key(j.as_ref()))
    }

    pub fn is_running<S: AsRef<str>>(&self, jobs: &[S]) -> bool {
        jobs.iter()
            .all(|j| self.running_jobs.contains_key(j.as_ref()))
    }

    pub fn is_successful<S: AsRef<str>>(&self, jobs: &[S]) -> bool {
        jobs.iter()
            .all(|j| self.successful_jobs.contains_key(j.as_ref()))
    }

    pub fn is_failed<S: AsRef<str>>(&self, jobs: &[S]) -> bool {
        jobs.iter()
            .all(|j| self.failed_jobs.contains_key(j.as_ref()))
    }

    // -----------------------------------------------------------------------
    // Counts
    // -----------------------------------------------------------------------

    pub fn count(&self) -> usize {
        self.pending_jobs.len()
            + self.running_jobs.len()
            + self.successful_jobs.len()
            + self.failed_jobs.len()
    }

    pub fn num_pending_jobs(&self) -> usize {
        self.pending_jobs.len()
    }

    pub fn num_running_jobs(&self) -> usize {
        self.running_jobs.len()
    }

    /// Active = pending plus running: anything that has not terminated.
    pub fn num_active_jobs(&self) -> usize {
        self.pending_jobs.len() + self.running_jobs.len()
    }

    pub fn num_successful_jobs(&self) -> usize {
        self.successful_jobs.len()
    }

    pub fn num_failed_jobs(&self) -> usize {
        self.failed_jobs.len()
    }

    // -----------------------------------------------------------------------
    // Lists — sorted for deterministic output
    // -----------------------------------------------------------------------

    pub fn pending_list(&self) -> Vec<String> {
        self.pending_jobs.keys().cloned().collect()
    }

    pub fn running_list(&self) -> Vec<String> {
        self.running_jobs.keys().cloned().collect()
    }

    pub fn active_list(&self) -> Vec<String> {
        let mut list: Vec<String> = self
            .pending_jobs
            .keys()
            .chain(self.running_jobs.keys())
            .cloned()
            .collect();
        list.sort();
        list
    }

    pub fn successful_list(&self) -> Vec<String> {
        self.successful_jobs.keys().cloned().collect()
    }

    pub fn failed_list(&self) -> Vec<String> {
        self.failed_jobs.keys().cloned().collect()
    }

    /// Printable form of every classified job, for failure messages.
    pub fn list_all(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "\n * Pending: {:?}", self.pending_list());
        let _ = write!(out, "\n * Running: {:?}", self.running_list());
        let _ = write!(out, "\n * Success: {:?}", self.successful_list());
        let _ = write!(out, "\n * Failed: {:?}", self.failed_list());
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lf(phase: Phase) -> Lifecycle {
        Lifecycle::with_phase(phase)
    }

    #[test]
    fn buckets_by_phase() {
        let mut view = Classifier::new();
        view.classify("boot", &lf(Phase::Uninitialized));
        view.classify("disco", &lf(Phase::Discoverable));
        view.classify("db", &lf(Phase::Pending));
        view.classify("web", &lf(Phase::Running));
        view.classify("victim", &lf(Phase::Chaos));
        view.classify("loader", &lf(Phase::Success));
        view.classify("flaky", &lf(Phase::Failed));

        assert!(view.is_pending(&["boot", "disco", "db"]));
        assert!(view.is_running(&["web", "victim"]));
        assert!(view.is_successful(&["loader"]));
        assert!(view.is_failed(&["flaky"]));
        assert_eq!(view.num_active_jobs(), 5);
        assert_eq!(view.count(), 7);
    }

    #[test]
    fn empty_name_list_is_vacuously_true() {
        let view = Classifier::new();
        let none: &[&str] = &[];
        assert!(view.is_running(none));
        assert!(view.is_successful(none));
    }

    #[test]
    fn reclassification_is_idempotent() {
        let mut view = Classifier::new();
        view.classify("db", &lf(Phase::Running));
        view.classify("db", &lf(Phase::Running));

        assert_eq!(view.count(), 1);
        assert_eq!(view.num_running_jobs(), 1);
    }

    #[test]
    fn last_write_wins() {
        let mut view = Classifier::new();
        view.classify("db", &lf(Phase::Running));
        view.classify("db", &lf(Phase::Success));

        assert!(!view.is_running(&["db"]));
        assert!(view.is_successful(&["db"]));
        assert_eq!(view.count(), 1);
    }

    #[test]
    fn counts_partition_the_total() {
        let mut view = Classifier::new();
        view.classify("a", &lf(Phase::Pending));
        view.classify("b", &lf(Phase::Running));
        view.classify("c", &lf(Phase::Success));
        view.classify("d", &lf(Phase::Failed));

        assert_eq!(
            view.num_active_jobs() + view.num_successful_jobs() + view.num_failed_jobs(),
            view.count()
        );
    }

    #[test]
    fn reset_clears_everything() {
        let mut view = Classifier::new();
        view.classify("a", &lf(Phase::Running));
        view.reset();
        assert_eq!(view.count(), 0);
        assert!(!view.is_running(&["a"]));
    }

    #[test]
    fn lists_are_sorted() {
        let mut view = Classifier::new();
        view.classify("zeta", &lf(Phase::Running));
        view.classify("alpha", &lf(Phase::Running));
        view.classify("mid", &lf(Phase::Pending));

        assert_eq!(view.running_list(), vec!["alpha", "zeta"]);
        assert_eq!(view.active_list(), vec!["alpha", "mid", "zeta"]);
    }
}
