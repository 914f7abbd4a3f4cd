use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use super::LOGIN_STEP;
use crate::ui::Notice;
use crate::wizard::{Step, StepContext, StepError, StepOutcome, SAVED_USERNAME_KEY};

/// Username/password login producing a session
#[derive(Debug, Clone, Default)]
pub struct LoginStep {
    username: Option<String>,
    save_username: bool,
}

impl LoginStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `username` instead of prompting for it
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        let username = username.into();
        self.username = (!username.trim().is_empty()).then_some(username);
        self
    }

    /// Remember the username (never the password) after a successful login
    pub fn save_username(mut self, save: bool) -> Self {
        self.save_username = save;
        self
    }

    fn login(&self, ctx: &mut StepContext<'_>) -> Result<Option<Value>, StepError> {
        if let Some(current) = ctx.session().filter(|s| s.is_valid()).cloned() {
            ctx.notify(
                Notice::Info,
                &format!("Already logged in as {}", current.username),
            );
            if !ctx.prompter().confirm("Do you want to re-login?", false)? {
                return Ok(Some(json!({ "username": current.username })));
            }
        }

        let username = match &self.username {
            Some(username) => username.trim().to_string(),
            None => self.ask_username(ctx)?,
        };
        let password = ctx.prompter().secret("Password")?;

        let auth = Arc::clone(&ctx.clients().auth);
        let user = username.clone();
        let session = ctx.run_remote("Authenticating...", move || {
            Ok(auth.authenticate(&user, &password)?)
        })?;

        info!(username = %session.username, "Login succeeded");
        ctx.notify(
            Notice::Success,
            &format!("Login successful! Welcome, {}", session.username),
        );

        if self.save_username {
            ctx.remember(SAVED_USERNAME_KEY, json!(username));
        }
        ctx.set_session(session);

        Ok(Some(json!({ "username": username })))
    }

    fn ask_username(&self, ctx: &mut StepContext<'_>) -> Result<String, StepError> {
        let saved: Option<String> = ctx.stored_as(SAVED_USERNAME_KEY);
        loop {
            let username = ctx.prompter().input("Username", saved.as_deref())?;
            let username = username.trim();
            if !username.is_empty() {
                return Ok(username.to_string());
            }
            ctx.notify(Notice::Warning, "Username cannot be empty");
        }
    }
}

impl Step for LoginStep {
    fn name(&self) -> &str {
        LOGIN_STEP
    }

    fn order(&self) -> u32 {
        10
    }

    fn title(&self) -> &str {
        "User Authentication"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> StepOutcome {
        self.login(ctx).into()
    }

    // The session check above already asks before logging in again
    fn requires_confirmation_on_revisit(&self) -> bool {
        false
    }

    fn authenticates(&self) -> bool {
        true
    }

    fn describe(&self, result: &Value) -> String {
        match result.get("username").and_then(Value::as_str) {
            Some(username) => format!("Logged in as {}", username),
            None => "Logged in".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RemoteClients, Session};
    use crate::config::Config;
    use crate::dispatcher::TaskDispatcher;
    use crate::store::PersistentStore;
    use crate::ui::ScriptedPrompter;
    use crate::wizard::ErrorKind;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        config: Config,
        store: PersistentStore,
        clients: RemoteClients,
        dispatcher: TaskDispatcher,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        Fixture {
            store: PersistentStore::empty(dir.path().join("state.json")),
            clients: RemoteClients::offline(&config),
            dispatcher: TaskDispatcher::new(Duration::from_millis(20)).unwrap(),
            config,
            _dir: dir,
        }
    }

    fn run(
        fx: &Fixture,
        step: &LoginStep,
        prompter: &mut ScriptedPrompter,
        session: Option<Session>,
    ) -> (StepOutcome, Option<Session>, Vec<(String, Value)>) {
        let mut ctx = StepContext::new(
            prompter,
            &fx.dispatcher,
            &fx.clients,
            &fx.config.wizard,
            &fx.store,
            session,
        );
        let outcome = step.run(&mut ctx);
        let (session, writes) = ctx.into_parts();
        (outcome, session, writes)
    }

    #[test]
    fn test_login_issues_session() {
        let fx = fixture();
        let mut prompter = ScriptedPrompter::new().text("john.doe").text("secret");
        let transcript = prompter.transcript();

        let (outcome, session, writes) = run(&fx, &LoginStep::new(), &mut prompter, None);

        match outcome {
            StepOutcome::Success(value) => assert_eq!(value, json!({"username": "john.doe"})),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(session.unwrap().username, "john.doe");
        assert!(writes.is_empty());
        assert!(transcript.contains("Login successful! Welcome, john.doe"));
    }

    #[test]
    fn test_login_with_id_and_save() {
        let fx = fixture();
        let mut prompter = ScriptedPrompter::new().text("secret");
        let step = LoginStep::new().with_username("jane").save_username(true);

        let (outcome, _, writes) = run(&fx, &step, &mut prompter, None);

        assert!(matches!(outcome, StepOutcome::Success(_)));
        assert_eq!(
            writes,
            vec![(SAVED_USERNAME_KEY.to_string(), json!("jane"))]
        );
    }

    #[test]
    fn test_empty_password_is_an_auth_failure() {
        let fx = fixture();
        let mut prompter = ScriptedPrompter::new().text("john").text("");

        let (outcome, session, _) = run(&fx, &LoginStep::new(), &mut prompter, None);

        match outcome {
            StepOutcome::Failure(err) => assert_eq!(err.kind(), ErrorKind::Auth),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(session.is_none());
    }

    #[test]
    fn test_valid_session_is_kept_when_relogin_declined() {
        let fx = fixture();
        let existing = Session::issue("john.doe", Duration::from_secs(60));
        let mut prompter = ScriptedPrompter::new().yes_no(false);
        let transcript = prompter.transcript();

        let (outcome, session, _) =
            run(&fx, &LoginStep::new(), &mut prompter, Some(existing.clone()));

        assert!(matches!(outcome, StepOutcome::Success(_)));
        assert_eq!(session, Some(existing));
        assert!(transcript.contains("Already logged in as john.doe"));
    }

    #[test]
    fn test_saved_username_is_the_default() {
        let mut fx = fixture();
        fx.store.set(SAVED_USERNAME_KEY, json!("saved.user")).unwrap();
        // Empty input takes the default
        let mut prompter = ScriptedPrompter::new().text("").text("pw");

        let (outcome, _, _) = run(&fx, &LoginStep::new(), &mut prompter, None);

        match outcome {
            StepOutcome::Success(value) => assert_eq!(value["username"], "saved.user"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
