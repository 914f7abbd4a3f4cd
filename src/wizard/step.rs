//! The step abstraction and the context a step runs in

use std::sync::mpsc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::error::StepError;
use crate::api::{RemoteClients, Session};
use crate::config::WizardConfig;
use crate::dispatcher::{TaskDispatcher, TaskError};
use crate::store::PersistentStore;
use crate::ui::{Notice, Prompter};

/// What one activation of a step produced
#[derive(Debug)]
pub enum StepOutcome {
    Success(Value),
    Failure(StepError),
    /// The user backed out of the step's own prompts
    Cancelled,
}

impl From<Result<Option<Value>, StepError>> for StepOutcome {
    fn from(result: Result<Option<Value>, StepError>) -> Self {
        match result {
            Ok(Some(value)) => StepOutcome::Success(value),
            Ok(None) => StepOutcome::Cancelled,
            Err(err) => StepOutcome::Failure(err),
        }
    }
}

/// A named unit of the wizard
pub trait Step: Send {
    /// Stable identifier, used as the key in recorded results
    fn name(&self) -> &str;

    /// Position in the wizard; lower runs first
    fn order(&self) -> u32;

    /// Heading shown when the step starts
    fn title(&self) -> &str;

    fn run(&self, ctx: &mut StepContext<'_>) -> StepOutcome;

    /// Ask before re-running a step that already has a result
    fn requires_confirmation_on_revisit(&self) -> bool {
        true
    }

    /// Failures of this step count against the auth attempt cap
    fn authenticates(&self) -> bool {
        false
    }

    /// A valid session must exist before the step runs
    fn requires_session(&self) -> bool {
        false
    }

    /// Top-level store key that receives the step's result
    fn persist_key(&self) -> Option<&str> {
        None
    }

    /// One-line description of a recorded result
    fn describe(&self, result: &Value) -> String {
        result.to_string()
    }
}

/// What a running step may touch.
///
/// Built by the controller for a single activation. Session changes and extra
/// store writes are handed back to the controller, which applies them only
/// when the step succeeds.
pub struct StepContext<'a> {
    prompter: &'a mut dyn Prompter,
    dispatcher: &'a TaskDispatcher,
    clients: &'a RemoteClients,
    settings: &'a WizardConfig,
    store: &'a PersistentStore,
    session: Option<Session>,
    writes: Vec<(String, Value)>,
}

impl<'a> StepContext<'a> {
    pub fn new(
        prompter: &'a mut dyn Prompter,
        dispatcher: &'a TaskDispatcher,
        clients: &'a RemoteClients,
        settings: &'a WizardConfig,
        store: &'a PersistentStore,
        session: Option<Session>,
    ) -> Self {
        Self {
            prompter,
            dispatcher,
            clients,
            settings,
            store,
            session,
            writes: Vec::new(),
        }
    }

    pub fn prompter(&mut self) -> &mut dyn Prompter {
        &mut *self.prompter
    }

    pub fn notify(&mut self, level: Notice, message: &str) {
        self.prompter.notify(level, message);
    }

    pub fn show(&mut self, block: &str) {
        self.prompter.show(block);
    }

    pub fn clients(&self) -> &RemoteClients {
        self.clients
    }

    pub fn settings(&self) -> &WizardConfig {
        self.settings
    }

    /// Value of a top-level store key as of the last save
    pub fn stored(&self, key: &str) -> Option<&Value> {
        self.store.get(key)
    }

    /// Typed read of a top-level store key; a malformed value reads as absent
    pub fn stored_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.store.get_as(key).ok().flatten()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// Queue a top-level store write, applied if the step succeeds
    pub fn remember(&mut self, key: &str, value: Value) {
        self.writes.push((key.to_string(), value));
    }

    pub(crate) fn into_parts(self) -> (Option<Session>, Vec<(String, Value)>) {
        (self.session, self.writes)
    }

    /// Run `work` on the dispatcher and block this thread until it reports.
    ///
    /// The prompter shows `label` while waiting. Failures, panics and discards
    /// all come back as [`StepError::Task`].
    pub fn run_remote<T, W>(&mut self, label: &str, work: W) -> Result<T, StepError>
    where
        T: Send + 'static,
        W: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Result<T, TaskError>>();
        let error_tx = tx.clone();

        let id = self.dispatcher.submit(
            work,
            move |value| {
                let _ = tx.send(Ok(value));
            },
            Some(move |err: TaskError| {
                let _ = error_tx.send(Err(err));
            }),
        )?;
        debug!(task = %id, label, "Waiting on background work");

        self.prompter.waiting(label);
        let outcome = rx.recv();
        self.prompter.done_waiting();

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(StepError::Task(err)),
            // Both senders dropped without a callback firing
            Err(_) => Err(StepError::Task(TaskError::Discarded)),
        }
    }
}
