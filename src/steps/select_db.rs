use std::sync::Arc;

use serde_json::Value;

use super::choice::{self, Picked};
use super::{to_result, DbSelection, DB_SELECTION_KEY, SELECT_DB_STEP};
use crate::api::CatalogQuery;
use crate::ui::Notice;
use crate::wizard::{Step, StepContext, StepError, StepOutcome};

const LEVEL_TITLES: [&str; 3] = [
    "DB Code 1 (Database)",
    "DB Code 2 (Schema)",
    "DB Code 3 (Table)",
];

/// Three cascading choices: database, then schema, then table
#[derive(Debug, Clone, Default)]
pub struct SelectDbStep {
    presets: [Option<String>; 3],
}

impl SelectDbStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values given on the command line, tried before prompting
    pub fn with_presets(db1: Option<String>, db2: Option<String>, db3: Option<String>) -> Self {
        Self {
            presets: [db1, db2, db3],
        }
    }

    fn select(&self, ctx: &mut StepContext<'_>) -> Result<Option<Value>, StepError> {
        let mut chosen: Vec<String> = Vec::with_capacity(3);

        for (index, title) in LEVEL_TITLES.iter().enumerate() {
            let query = CatalogQuery::Database {
                level: index as u8 + 1,
                parents: chosen.clone(),
            };
            let label = format!("Loading {}...", query);
            let catalog = Arc::clone(&ctx.clients().catalog);
            let options = ctx.run_remote(&label, move || Ok(catalog.list(&query)?))?;

            if options.is_empty() {
                return Err(StepError::Unavailable(format!(
                    "No options available for {}",
                    title
                )));
            }

            let preset = self.presets[index].as_deref();
            let value = match preset.and_then(|p| choice::resolve_preset(&options, p)) {
                Some(value) => {
                    ctx.notify(Notice::Info, &format!("{}: {}", title, value));
                    value
                }
                None => {
                    if let Some(preset) = preset {
                        ctx.notify(
                            Notice::Warning,
                            &format!("'{}' does not match any option for {}", preset, title),
                        );
                    }
                    match choice::pick(ctx, &format!("Select {}", title), &options, false, 1)? {
                        Picked::Value(value) => value,
                        Picked::Skipped | Picked::Quit => return Ok(None),
                    }
                }
            };
            chosen.push(value);
        }

        let [db1, db2, db3]: [String; 3] = chosen
            .try_into()
            .map_err(|_| StepError::invalid("incomplete DB selection"))?;
        let selection = DbSelection { db1, db2, db3 };

        ctx.notify(
            Notice::Success,
            &format!("DB Code selected: {}", selection),
        );
        Ok(Some(to_result(&selection)))
    }
}

impl Step for SelectDbStep {
    fn name(&self) -> &str {
        SELECT_DB_STEP
    }

    fn order(&self) -> u32 {
        20
    }

    fn title(&self) -> &str {
        "Select DB Code"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> StepOutcome {
        self.select(ctx).into()
    }

    fn requires_session(&self) -> bool {
        true
    }

    fn persist_key(&self) -> Option<&str> {
        Some(DB_SELECTION_KEY)
    }

    fn describe(&self, result: &Value) -> String {
        serde_json::from_value::<DbSelection>(result.clone())
            .map(|s| s.to_string())
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

    fn run(step: &SelectDbStep, prompter: &mut ScriptedPrompter) -> StepOutcome {
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
        step.run(&mut ctx)
    }

    #[test]
    fn test_cascading_selection() {
        // Production has its own schema list; "users" is a unique substring
        let mut prompter = ScriptedPrompter::new().text("1").text("2").text("users");

        match run(&SelectDbStep::new(), &mut prompter) {
            StepOutcome::Success(value) => assert_eq!(
                value,
                json!({
                    "db1": "Production Database",
                    "db2": "Backup Schema",
                    "db3": "Users Table"
                })
            ),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_number_is_reprompted() {
        let mut prompter = ScriptedPrompter::new()
            .text("9")
            .text("test")
            .text("schema b")
            .text("logs");
        let transcript = prompter.transcript();

        let outcome = run(&SelectDbStep::new(), &mut prompter);

        assert!(matches!(outcome, StepOutcome::Success(_)));
        assert!(transcript.contains("Please enter a number between 1 and 5"));
    }

    #[test]
    fn test_ambiguous_term_opens_submenu() {
        let mut prompter = ScriptedPrompter::new()
            .text("database")
            .text("3")
            .text("1")
            .text("1");
        let transcript = prompter.transcript();

        match run(&SelectDbStep::new(), &mut prompter) {
            StepOutcome::Success(value) => {
                assert_eq!(value["db1"], "Test Database");
                assert_eq!(value["db2"], "Schema A");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(transcript.contains("Search results"));
    }

    #[test]
    fn test_presets_skip_prompts() {
        let step = SelectDbStep::with_presets(
            Some("production".into()),
            Some("Archive Schema".into()),
            Some("6".into()),
        );
        let mut prompter = ScriptedPrompter::new();

        match run(&step, &mut prompter) {
            StepOutcome::Success(value) => {
                assert_eq!(value["db2"], "Archive Schema");
                assert_eq!(value["db3"], "Configuration Table");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_quit_cancels() {
        let mut prompter = ScriptedPrompter::new().text("q");
        assert!(matches!(
            run(&SelectDbStep::new(), &mut prompter),
            StepOutcome::Cancelled
        ));
    }
}
