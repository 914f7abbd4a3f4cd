//! Runs the steps in order and owns the wizard state
//!
//! The controller is the only writer of [`WizardState`]. Every transition is
//! applied in memory first, then persisted, and only then is the next step
//! activated.

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::error::{ErrorKind, StepError};
use super::state::{WizardState, LAST_STATE_KEY, SESSION_KEY};
use super::step::{Step, StepContext, StepOutcome};
use super::view::{Summary, WizardView};
use crate::api::{RemoteClients, Session};
use crate::config::WizardConfig;
use crate::dispatcher::TaskDispatcher;
use crate::store::{PersistentStore, StoreError};
use crate::ui::{render, Notice, PromptError, Prompter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    Idle,
    /// Index of the step being run
    Running(usize),
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    UserQuit,
    AttemptCapReached { step: String },
    Fatal(String),
    /// Ctrl-C at a prompt
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Aborted(AbortReason),
}

impl RunOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::Aborted(AbortReason::Interrupted) => 130,
            RunOutcome::Aborted(_) => 1,
        }
    }
}

/// Whether the controller drives the whole wizard or a single command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Resumable, with navigation between steps and a final summary
    Wizard,
    /// One step; only its top-level keys and the session are stored
    Single,
}

/// Choices offered after a failed or cancelled step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    Retry,
    Back,
    Quit,
}

impl Recovery {
    fn label(&self) -> &'static str {
        match self {
            Recovery::Retry => "Retry",
            Recovery::Back => "Go back",
            Recovery::Quit => "Quit",
        }
    }
}

pub struct StepController {
    steps: Vec<Box<dyn Step>>,
    state: WizardState,
    status: ControllerStatus,
    store: PersistentStore,
    dispatcher: TaskDispatcher,
    clients: RemoteClients,
    prompter: Box<dyn Prompter>,
    settings: WizardConfig,
    mode: RunMode,
    finalized: bool,
    abort_reason: Option<AbortReason>,
}

impl StepController {
    /// Build a controller over `steps`, which run in ascending `order()`
    pub fn new(
        mut steps: Vec<Box<dyn Step>>,
        store: PersistentStore,
        dispatcher: TaskDispatcher,
        clients: RemoteClients,
        prompter: Box<dyn Prompter>,
        settings: WizardConfig,
    ) -> Self {
        steps.sort_by_key(|step| step.order());
        Self {
            steps,
            state: WizardState::default(),
            status: ControllerStatus::Idle,
            store,
            dispatcher,
            clients,
            prompter,
            settings,
            mode: RunMode::Wizard,
            finalized: false,
            abort_reason: None,
        }
    }

    /// Run as a one-off command rather than the resumable wizard
    pub fn single(mut self) -> Self {
        self.mode = RunMode::Single;
        self
    }

    pub fn status(&self) -> ControllerStatus {
        self.status
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn store(&self) -> &PersistentStore {
        &self.store
    }

    pub fn abort_reason(&self) -> Option<&AbortReason> {
        self.abort_reason.as_ref()
    }

    pub fn view(&self) -> WizardView {
        WizardView::build(self.status, &self.state, &self.steps)
    }

    fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Leave `Idle`. With `resume`, continue from the saved snapshot if there
    /// is one; otherwise start at the first step and drop any old snapshot.
    pub fn start(&mut self, resume: bool) -> Result<(), StepError> {
        if self.status != ControllerStatus::Idle {
            warn!(status = ?self.status, "Controller already started");
            return Ok(());
        }

        self.state = WizardState::default();
        self.state.session = match self.store.get_as::<Session>(SESSION_KEY) {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "Ignoring malformed stored session");
                None
            }
        };

        let snapshot = match (resume, self.mode) {
            (true, RunMode::Wizard) => self.store.get(LAST_STATE_KEY).cloned(),
            _ => None,
        };

        match snapshot {
            Some(snapshot) => match WizardState::from_snapshot(&snapshot, &self.step_names()) {
                Ok(mut restored) => {
                    restored.session = self.state.session.take();
                    self.state = restored;
                    info!(step_index = self.state.step_index, "Resuming wizard");
                }
                Err(reason) => {
                    error!(path = %self.store.path().display(), %reason, "Saved progress is unusable");
                    self.status = ControllerStatus::Aborted;
                    self.abort_reason = Some(AbortReason::Fatal(reason.clone()));
                    return Err(StepError::CorruptSnapshot(reason));
                }
            },
            None if resume => info!("No saved progress, starting from the first step"),
            None => debug!("Starting fresh"),
        }

        if self.steps.is_empty() {
            self.status = ControllerStatus::Completed;
            return Ok(());
        }

        self.status = ControllerStatus::Running(self.state.step_index);
        self.persist()?;

        if resume && self.state.step_index > 0 {
            let progress = render::progress(&self.view());
            self.prompter.show(&progress);
        }
        Ok(())
    }

    /// Drive the steps until the wizard completes or aborts
    pub fn run(&mut self) -> RunOutcome {
        loop {
            match self.status {
                ControllerStatus::Idle => {
                    if let Err(err) = self.start(false) {
                        return RunOutcome::Aborted(AbortReason::Fatal(err.to_string()));
                    }
                }
                ControllerStatus::Running(_) => self.activate(),
                ControllerStatus::Completed => return RunOutcome::Completed,
                ControllerStatus::Aborted => {
                    let reason = self
                        .abort_reason
                        .clone()
                        .unwrap_or(AbortReason::UserQuit);
                    return RunOutcome::Aborted(reason);
                }
            }
        }
    }

    /// Run the current step once and apply its outcome
    pub fn activate(&mut self) {
        let ControllerStatus::Running(index) = self.status else {
            return;
        };

        let total = self.steps.len();
        let header = render::step_header(index, total, self.steps[index].title());
        self.prompter.show(&header);

        if self.steps[index].requires_session() && !self.state.has_valid_session() {
            self.require_login(index);
            return;
        }

        if self.steps[index].requires_confirmation_on_revisit() {
            let prior = self.state.result(self.steps[index].name()).cloned();
            if let Some(prior) = prior {
                let described = self.steps[index].describe(&prior);
                self.prompter
                    .notify(Notice::Info, &format!("Already completed: {}", described));
                match self.prompter.confirm("Redo this step?", false) {
                    Ok(true) => {}
                    Ok(false) => {
                        let session = self.state.session.clone();
                        self.on_success(index, prior, session, Vec::new());
                        return;
                    }
                    Err(err) => {
                        self.on_failure(index, StepError::from(err));
                        return;
                    }
                }
            }
        }

        debug!(step = self.steps[index].name(), index, "Activating step");
        let (outcome, session, writes) = {
            let mut ctx = StepContext::new(
                &mut *self.prompter,
                &self.dispatcher,
                &self.clients,
                &self.settings,
                &self.store,
                self.state.session.clone(),
            );
            let outcome = self.steps[index].run(&mut ctx);
            let (session, writes) = ctx.into_parts();
            (outcome, session, writes)
        };

        match outcome {
            StepOutcome::Success(result) => self.on_success(index, result, session, writes),
            StepOutcome::Failure(err) => self.on_failure(index, err),
            StepOutcome::Cancelled => self.on_cancelled(index),
        }
    }

    /// Session missing or expired: send the user back to the login step
    fn require_login(&mut self, index: usize) {
        if self.state.session.take().is_some() {
            self.prompter
                .notify(Notice::Warning, "Session expired. Please login again.");
        }

        match self.steps[..index].iter().position(|step| step.authenticates()) {
            Some(login) => {
                info!(from = index, to = login, "No valid session, returning to login");
                self.state.step_index = login;
                self.status = ControllerStatus::Running(login);
                self.persist_or_abort();
            }
            None => {
                let message = "Please login first (run 'tm-setter login')";
                self.prompter.notify(Notice::Error, message);
                self.abort(AbortReason::Fatal(message.to_string()));
            }
        }
    }

    fn on_success(
        &mut self,
        index: usize,
        result: Value,
        session: Option<Session>,
        writes: Vec<(String, Value)>,
    ) {
        let name = self.steps[index].name().to_string();
        let persist_key = self.steps[index].persist_key().map(str::to_string);

        self.state.record_success(&name, result.clone());
        self.state.session = session;
        self.state.step_index = index + 1;

        let mut applied = writes
            .into_iter()
            .try_for_each(|(key, value)| self.store.set(&key, value));
        if let (true, Some(key)) = (applied.is_ok(), persist_key) {
            applied = self.store.set(&key, result);
        }
        if let Err(err) = applied {
            self.store_failed(err);
            return;
        }

        info!(step = %name, index, "Step completed");

        if index + 1 >= self.steps.len() {
            self.status = ControllerStatus::Completed;
            if self.persist_or_abort() {
                self.finalize();
            }
            return;
        }

        self.status = ControllerStatus::Running(index + 1);
        if self.persist_or_abort() && self.mode == RunMode::Wizard {
            self.offer_next(index);
        }
    }

    /// Continue / go back / quit after a step that was not the last
    fn offer_next(&mut self, index: usize) {
        let items = ["Continue", "Go back", "Quit"];
        match self.prompter.select("What next?", &items, 0) {
            Ok(0) => {}
            Ok(1) => {
                // Back onto the step just finished
                self.status = ControllerStatus::Running(index);
                self.state.step_index = index;
                self.persist_or_abort();
            }
            Ok(_) => self.quit(),
            Err(err) => self.prompt_failed(err),
        }
    }

    fn on_failure(&mut self, index: usize, err: StepError) {
        let name = self.steps[index].name().to_string();

        if err.is_interrupt() {
            warn!(step = %name, "Interrupted");
            self.abort(AbortReason::Interrupted);
            return;
        }

        let kind = err.kind();
        match kind {
            ErrorKind::Fatal => {
                error!(step = %name, error = %err, "Step failed");
                self.prompter.notify(Notice::Error, &err.to_string());
                self.abort(AbortReason::Fatal(err.to_string()));
            }
            ErrorKind::Validation => {
                debug!(step = %name, error = %err, "Invalid input");
                self.prompter.notify(Notice::Error, &err.to_string());
                self.recover(index);
            }
            ErrorKind::Transient | ErrorKind::Auth => {
                let attempts = self.state.record_failure(&name);
                warn!(step = %name, %kind, attempts, error = %err, "Step failed");

                if self.steps[index].authenticates() && attempts >= self.settings.auth_attempt_cap
                {
                    self.prompter.notify(
                        Notice::Error,
                        &format!("Too many failed attempts ({}): {}", attempts, err),
                    );
                    self.abort(AbortReason::AttemptCapReached { step: name });
                    return;
                }

                if self.persist_or_abort() {
                    self.prompter.notify(Notice::Error, &err.to_string());
                    self.recover(index);
                }
            }
        }
    }

    fn on_cancelled(&mut self, index: usize) {
        info!(step = self.steps[index].name(), "Step cancelled");
        if self.mode == RunMode::Single {
            self.quit();
            return;
        }
        self.prompter.notify(Notice::Warning, "Step cancelled");
        self.recover(index);
    }

    /// Offer retry, back (not on the first step) or quit
    fn recover(&mut self, index: usize) {
        let mut choices = vec![Recovery::Retry];
        if index > 0 && self.mode == RunMode::Wizard {
            choices.push(Recovery::Back);
        }
        choices.push(Recovery::Quit);
        let labels: Vec<&str> = choices.iter().map(Recovery::label).collect();

        match self.prompter.select("What would you like to do?", &labels, 0) {
            Ok(choice) => match choices.get(choice).copied() {
                Some(Recovery::Retry) => self.retry(),
                Some(Recovery::Back) => self.back(),
                Some(Recovery::Quit) | None => self.quit(),
            },
            Err(err) => self.prompt_failed(err),
        }
    }

    /// Run the current step again on the next activation
    pub fn retry(&mut self) {
        if let ControllerStatus::Running(index) = self.status {
            debug!(index, "Retrying step");
        }
    }

    /// Move to the previous step, keeping recorded results. No-op on the first
    /// step.
    pub fn back(&mut self) {
        let ControllerStatus::Running(index) = self.status else {
            return;
        };
        if index == 0 {
            debug!("Already at the first step");
            return;
        }
        self.status = ControllerStatus::Running(index - 1);
        self.state.step_index = index - 1;
        info!(from = index, to = index - 1, "Going back");
        self.persist_or_abort();
    }

    /// Stop the wizard, keeping saved progress for a later resume
    pub fn quit(&mut self) {
        if matches!(self.status, ControllerStatus::Running(_)) {
            info!("Wizard quit by user");
            self.abort(AbortReason::UserQuit);
        }
    }

    /// Print the final summary. Runs at most once per controller.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        if self.mode == RunMode::Wizard {
            let summary = Summary::from_state(&self.state, &self.steps);
            self.prompter.show(&render::summary(&summary));
            self.prompter.notify(Notice::Success, "All steps completed!");
        }
        info!(steps = self.steps.len(), "Wizard completed");
    }

    /// Stop the dispatcher, waiting for in-flight work up to the configured
    /// timeout
    pub fn shutdown(&self) -> bool {
        self.dispatcher.shutdown(self.settings.shutdown_timeout())
    }

    fn abort(&mut self, reason: AbortReason) {
        warn!(reason = ?reason, "Wizard aborted");
        self.status = ControllerStatus::Aborted;
        self.abort_reason = Some(reason);
        if let Err(err) = self.persist() {
            error!(error = %err, "Failed to save progress after abort");
        }
    }

    fn prompt_failed(&mut self, err: PromptError) {
        match err {
            PromptError::Interrupted => self.abort(AbortReason::Interrupted),
            other => {
                error!(error = %other, "Prompt failed");
                self.abort(AbortReason::Fatal(other.to_string()));
            }
        }
    }

    fn store_failed(&mut self, err: StoreError) {
        error!(error = %err, "Failed to save progress");
        self.prompter
            .notify(Notice::Error, &format!("Failed to save progress: {}", err));
        self.status = ControllerStatus::Aborted;
        self.abort_reason = Some(AbortReason::Fatal(err.to_string()));
    }

    /// Persist, aborting on failure. Returns whether the save succeeded.
    fn persist_or_abort(&mut self) -> bool {
        match self.persist() {
            Ok(()) => true,
            Err(err) => {
                self.store_failed(err);
                false
            }
        }
    }

    /// Write the snapshot (wizard mode only) and the session, then save
    fn persist(&mut self) -> Result<(), StoreError> {
        if self.mode == RunMode::Wizard {
            if self.status == ControllerStatus::Completed {
                self.store.remove(LAST_STATE_KEY);
            } else {
                self.store.set(LAST_STATE_KEY, self.state.to_snapshot())?;
            }
        }

        match &self.state.session {
            Some(session) => self.store.set_as(SESSION_KEY, session)?,
            None => {
                self.store.remove(SESSION_KEY);
            }
        }

        self.store.save()?;
        debug!(
            path = %self.store.path().display(),
            step_index = self.state.step_index,
            "Progress saved"
        );
        Ok(())
    }
}
