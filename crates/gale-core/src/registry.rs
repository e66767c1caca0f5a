use crate::action::{Action, EmbedActions};
use crate::error::SpecError;
use crate::types::ActionType;

// ---------------------------------------------------------------------------
// KindRegistry
// ---------------------------------------------------------------------------
//
// Table of per-kind payload checks, passed by reference to whoever validates.
// An explicit value rather than process-global state, so tests and embedders
// can hold registries with different kind sets side by side.

type PayloadCheck = fn(&Action) -> Result<(), SpecError>;

pub struct KindRegistry {
    entries: Vec<(ActionType, PayloadCheck)>,
}

impl KindRegistry {
    /// Registry covering every built-in action kind.
    pub fn builtin() -> Self {
        KindRegistry {
            entries: ActionType::all()
                .iter()
                .map(|&kind| (kind, check_payload_slot as PayloadCheck))
                .collect(),
        }
    }

    pub fn supports(&self, kind: ActionType) -> bool {
        self.entries.iter().any(|(k, _)| *k == kind)
    }

    /// Runs the payload check registered for the action's kind.
    pub fn check(&self, action: &Action) -> Result<(), SpecError> {
        let check = self
            .entries
            .iter()
            .find(|(kind, _)| *kind == action.action_type)
            .map(|(_, check)| check)
            .ok_or_else(|| SpecError::MismatchedPayload {
                action: action.name.clone(),
                expected: action.action_type.to_string(),
            })?;

        check(action)
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn populated_slots(payload: &EmbedActions) -> Vec<ActionType> {
    let mut slots = Vec::new();
    if payload.service.is_some() {
        slots.push(ActionType::Service);
    }
    if payload.cluster.is_some() {
        slots.push(ActionType::Cluster);
    }
    if payload.chaos.is_some() {
        slots.push(ActionType::Chaos);
    }
    if payload.cascade.is_some() {
        slots.push(ActionType::Cascade);
    }
    if payload.delete.is_some() {
        slots.push(ActionType::Delete);
    }
    if payload.call.is_some() {
        slots.push(ActionType::Call);
    }
    slots
}

/// Exactly one payload slot must be set, and it must be the slot matching
/// the declared kind.
fn check_payload_slot(action: &Action) -> Result<(), SpecError> {
    let slots = populated_slots(&action.payload);

    if slots.is_empty() {
        return Err(SpecError::MissingPayload {
            action: action.name.clone(),
            expected: action.action_type.to_string(),
        });
    }

    if slots != [action.action_type] {
        return Err(SpecError::MismatchedPayload {
            action: action.name.clone(),
            expected: action.action_type.to_string(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
