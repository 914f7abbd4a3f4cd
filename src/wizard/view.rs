//! Read-only projection of wizard progress for rendering

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::controller::ControllerStatus;
use super::state::{WizardState, SESSION_KEY};
use super::step::Step;
use crate::api::{Issue, Session};
use crate::steps::{
    Configuration, DbSelection, CONFIGURATION_KEY, DB_SELECTION_KEY, ISSUE_SELECTION_KEY,
};
use crate::store::PersistentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMark {
    Done,
    Current,
    Pending,
}

#[derive(Debug, Clone)]
pub struct StepLine {
    pub name: String,
    pub title: String,
    pub mark: StepMark,
    /// Description of the recorded result, if any
    pub detail: Option<String>,
    pub attempts: u32,
}

/// The collected selections, as printed at the end of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub user: Option<String>,
    pub db_selection: Option<DbSelection>,
    pub issue: Option<Issue>,
    pub configuration: Option<Configuration>,
}

fn typed<T: DeserializeOwned>(value: Option<&Value>) -> Option<T> {
    value.and_then(|v| serde_json::from_value(v.clone()).ok())
}

impl Summary {
    /// Build from values keyed the way they are persisted at top level
    fn from_lookup<'v>(lookup: impl Fn(&str) -> Option<&'v Value>) -> Self {
        Self {
            user: typed::<Session>(lookup(SESSION_KEY)).map(|s| s.username),
            db_selection: typed(lookup(DB_SELECTION_KEY)),
            issue: typed(lookup(ISSUE_SELECTION_KEY)),
            configuration: typed(lookup(CONFIGURATION_KEY)),
        }
    }

    /// Selections as saved in the store
    pub fn from_store(store: &PersistentStore) -> Self {
        Self::from_lookup(|key| store.get(key))
    }

    /// Selections recorded by the current run, with the session user
    pub fn from_state(state: &WizardState, steps: &[Box<dyn Step>]) -> Self {
        let mut by_key: Map<String, Value> = Map::new();
        for step in steps {
            if let (Some(key), Some(result)) = (step.persist_key(), state.result(step.name())) {
                by_key.insert(key.to_string(), result.clone());
            }
        }

        let mut summary = Self::from_lookup(|key| by_key.get(key));
        summary.user = state.session.as_ref().map(|s| s.username.clone());
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_none()
            && self.db_selection.is_none()
            && self.issue.is_none()
            && self.configuration.is_none()
    }
}

/// View model handed to the renderer; never the source of truth
#[derive(Debug, Clone)]
pub struct WizardView {
    pub status: ControllerStatus,
    pub step_index: usize,
    pub total_steps: usize,
    pub steps: Vec<StepLine>,
    pub session_user: Option<String>,
    pub session_expires_in: Option<Duration>,
    pub summary: Summary,
}

impl WizardView {
    pub fn build(status: ControllerStatus, state: &WizardState, steps: &[Box<dyn Step>]) -> Self {
        let current = match status {
            ControllerStatus::Running(i) => Some(i),
            _ => None,
        };

        let lines = steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let result = state.result(step.name());
                let mark = if current == Some(index) {
                    StepMark::Current
                } else if result.is_some() {
                    StepMark::Done
                } else {
                    StepMark::Pending
                };
                StepLine {
                    name: step.name().to_string(),
                    title: step.title().to_string(),
                    mark,
                    detail: result.map(|r| step.describe(r)),
                    attempts: state.attempts(step.name()),
                }
            })
            .collect();

        let live_session = state.session.as_ref().filter(|s| s.is_valid());

        Self {
            status,
            step_index: state.step_index,
            total_steps: steps.len(),
            steps: lines,
            session_user: live_session.map(|s| s.username.clone()),
            session_expires_in: live_session.map(Session::remaining),
            summary: Summary::from_state(state, steps),
        }
    }

    /// The step currently running, if any
    pub fn current(&self) -> Option<&StepLine> {
        match self.status {
            ControllerStatus::Running(i) => self.steps.get(i),
            _ => None,
        }
    }
}
