//! Wizard progress and its persisted snapshot

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::Session;

/// Store key of the resumable snapshot
pub const LAST_STATE_KEY: &str = "last_state";
/// Store key of the current session
pub const SESSION_KEY: &str = "session";
/// Store key of the remembered login name
pub const SAVED_USERNAME_KEY: &str = "saved_username";

/// Progress of one wizard run. Owned and mutated by the controller only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WizardState {
    pub step_index: usize,
    /// Result of each completed step, keyed by step name, in completion order
    pub step_results: Map<String, Value>,
    pub session: Option<Session>,
    pub attempt_counts: BTreeMap<String, u32>,
}

/// On-disk shape of `last_state`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    step_index: usize,
    #[serde(default)]
    step_results: Map<String, Value>,
    #[serde(default)]
    attempt_counts: BTreeMap<String, u32>,
}

impl WizardState {
    pub fn result(&self, step: &str) -> Option<&Value> {
        self.step_results.get(step)
    }

    pub fn attempts(&self, step: &str) -> u32 {
        self.attempt_counts.get(step).copied().unwrap_or(0)
    }

    /// Record a step's result and clear its failure count
    pub fn record_success(&mut self, step: &str, result: Value) {
        self.step_results.insert(step.to_string(), result);
        self.attempt_counts.insert(step.to_string(), 0);
    }

    /// Count one more failure of `step`, returning the new total
    pub fn record_failure(&mut self, step: &str) -> u32 {
        let count = self.attempt_counts.entry(step.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn has_valid_session(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_valid)
    }

    /// Serialize everything except the session, which lives under its own key
    pub fn to_snapshot(&self) -> Value {
        let snapshot = Snapshot {
            step_index: self.step_index,
            step_results: self.step_results.clone(),
            attempt_counts: self.attempt_counts.clone(),
        };
        serde_json::to_value(snapshot).unwrap_or(Value::Null)
    }

    /// Rebuild state from `last_state`, checking it against the step list.
    ///
    /// Every step before `stepIndex` must have a recorded result, and
    /// `stepIndex` must name an existing step.
    pub fn from_snapshot(value: &Value, step_names: &[&str]) -> Result<Self, String> {
        let snapshot: Snapshot =
            serde_json::from_value(value.clone()).map_err(|e| format!("invalid shape: {}", e))?;

        if snapshot.step_index >= step_names.len() {
            return Err(format!(
                "stepIndex {} is past the last step ({} steps)",
                snapshot.step_index,
                step_names.len()
            ));
        }

        if let Some(missing) = step_names[..snapshot.step_index]
            .iter()
            .find(|name| !snapshot.step_results.contains_key(**name))
        {
            return Err(format!(
                "no recorded result for completed step '{}'",
                missing
            ));
        }

        Ok(Self {
            step_index: snapshot.step_index,
            step_results: snapshot.step_results,
            session: None,
            attempt_counts: snapshot.attempt_counts,
        })
    }
}
