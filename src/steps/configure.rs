use std::sync::Arc;

use serde_json::Value;

use super::choice::{self, Picked};
use super::{to_result, Configuration, CONFIGURATION_KEY, CONFIGURE_STEP};
use crate::api::CatalogQuery;
use crate::ui::Notice;
use crate::wizard::{Step, StepContext, StepError, StepOutcome};

/// Optional repository and binary version choice
#[derive(Debug, Clone, Default)]
pub struct ConfigureStep {
    repo: Option<String>,
    version: Option<String>,
    skip: bool,
}

impl ConfigureStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_presets(repo: Option<String>, version: Option<String>) -> Self {
        Self {
            repo,
            version,
            skip: false,
        }
    }

    /// Take the presets as they are, without prompting
    pub fn skip_prompts(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    fn choose(
        ctx: &mut StepContext<'_>,
        query: CatalogQuery,
        heading: &str,
        preset: Option<&str>,
        columns: usize,
    ) -> Result<Picked, StepError> {
        let label = format!("Loading {}...", query);
        let catalog = Arc::clone(&ctx.clients().catalog);
        let options = ctx.run_remote(&label, move || Ok(catalog.list(&query)?))?;

        if let Some(preset) = preset {
            if let Some(value) = choice::resolve_preset(&options, preset) {
                ctx.notify(Notice::Info, &format!("{}: {}", heading, value));
                return Ok(Picked::Value(value));
            }
            ctx.notify(
                Notice::Warning,
                &format!("'{}' does not match any option", preset),
            );
        }

        if options.is_empty() {
            ctx.notify(Notice::Warning, &format!("Nothing to choose for {}", heading));
            return Ok(Picked::Skipped);
        }

        choice::pick(ctx, heading, &options, true, columns)
    }

    fn configure(&self, ctx: &mut StepContext<'_>) -> Result<Option<Value>, StepError> {
        if self.skip {
            ctx.notify(Notice::Info, "Skipping configuration");
            return Ok(Some(to_result(&Configuration {
                repo: self.repo.clone(),
                version: self.version.clone(),
            })));
        }

        let repo = match Self::choose(
            ctx,
            CatalogQuery::Repository,
            "Repository Configuration",
            self.repo.as_deref(),
            1,
        )? {
            Picked::Value(repo) => Some(repo),
            Picked::Skipped => None,
            Picked::Quit => return Ok(None),
        };

        let version = match Self::choose(
            ctx,
            CatalogQuery::Version,
            "Binary SW Version Configuration",
            self.version.as_deref(),
            3,
        )? {
            Picked::Value(version) => Some(version),
            Picked::Skipped => None,
            Picked::Quit => return Ok(None),
        };

        let configuration = Configuration { repo, version };
        ctx.notify(
            Notice::Success,
            &format!("Configuration saved: {}", configuration),
        );
        Ok(Some(to_result(&configuration)))
    }
}

impl Step for ConfigureStep {
    fn name(&self) -> &str {
        CONFIGURE_STEP
    }

    fn order(&self) -> u32 {
        40
    }

    fn title(&self) -> &str {
        "Configuration (Optional)"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> StepOutcome {
        self.configure(ctx).into()
    }

    fn requires_session(&self) -> bool {
        true
    }

    fn persist_key(&self) -> Option<&str> {
        Some(CONFIGURATION_KEY)
    }

    fn describe(&self, result: &Value) -> String {
        serde_json::from_value::<Configuration>(result.clone())
            .map(|c| c.to_string())
            .unwrap_or_else(|_| result.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RemoteClients;
    use crate::config::Config;
    use crate::dispatcher::TaskDispatcher;
    use crate::store::PersistentStore;
    use crate::ui::ScriptedPrompter;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn run(step: &ConfigureStep, prompter: &mut ScriptedPrompter) -> Value {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let store = PersistentStore::empty(dir.path().join("state.json"));
        let clients = RemoteClients::offline(&config);
        let dispatcher = TaskDispatcher::new(Duration::from_millis(20)).unwrap();

        let mut ctx = StepContext::new(
            prompter,
            &dispatcher,
            &clients,
            &config.wizard,
            &store,
            None,
        );
        match step.run(&mut ctx) {
            StepOutcome::Success(value) => value,
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_number_and_exact_name() {
        let mut prompter = ScriptedPrompter::new().text("3").text("v2.4.1");
        let value = run(&ConfigureStep::new(), &mut prompter);
        assert_eq!(value, json!({"repo": "frontend-app", "version": "v2.4.1"}));
    }

    #[test]
    fn test_enter_skips_each_choice() {
        let mut prompter = ScriptedPrompter::new().text("pipeline").text("");
        let value = run(&ConfigureStep::new(), &mut prompter);
        assert_eq!(value, json!({"repo": "data-pipeline", "version": null}));
    }

    #[test]
    fn test_skip_flag_keeps_presets() {
        let mut prompter = ScriptedPrompter::new();
        let step = ConfigureStep::with_presets(Some("infrastructure".into()), None)
            .skip_prompts(true);
        let value = run(&step, &mut prompter);
        assert_eq!(value, json!({"repo": "infrastructure", "version": null}));
    }

    #[test]
    fn test_versions_listed_in_columns() {
        let mut prompter = ScriptedPrompter::new().text("").text("1");
        let transcript = prompter.transcript();
        let value = run(&ConfigureStep::new(), &mut prompter);

        assert_eq!(value["version"], "v3.0.0");
        assert!(transcript.contains("Binary SW Version Configuration"));
        // Twelve versions in three columns
        assert!(transcript.lines().iter().any(|l| l.contains("v3.0.0") && l.contains("v2.5.0")));
    }
}
