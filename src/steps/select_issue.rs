use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{to_result, DbSelection, DB_SELECTION_KEY, ISSUE_SELECTION_KEY, SELECT_ISSUE_STEP};
use crate::api::providers::looks_like_issue_key;
use crate::api::{Issue, IssuePage};
use crate::ui::{render, Notice};
use crate::wizard::{Step, StepContext, StepError, StepOutcome};

const ISSUE_PROMPT: &str =
    "Enter issue number, issue key, or command (n=next, p=prev, s=search, q=quit)";

/// One line typed at the issue prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueCommand {
    Next,
    Previous,
    Search,
    Quit,
    /// Row on the current page, 0-based
    Pick(usize),
    /// An issue key not shown on the current page
    Lookup(String),
    Empty,
    Invalid(String),
}

/// Interpret `input` against the issues on the current page
pub fn parse_issue_command(input: &str, issues: &[Issue]) -> IssueCommand {
    let input = input.trim();
    if input.is_empty() {
        return IssueCommand::Empty;
    }

    match input.to_lowercase().as_str() {
        "n" | "next" => return IssueCommand::Next,
        "p" | "prev" => return IssueCommand::Previous,
        "s" | "search" => return IssueCommand::Search,
        "q" | "quit" => return IssueCommand::Quit,
        _ => {}
    }

    if let Ok(number) = input.parse::<usize>() {
        return if (1..=issues.len()).contains(&number) {
            IssueCommand::Pick(number - 1)
        } else {
            IssueCommand::Invalid(format!(
                "Please enter a number between 1 and {}",
                issues.len()
            ))
        };
    }

    if let Some(index) = issues
        .iter()
        .position(|issue| issue.key.eq_ignore_ascii_case(input))
    {
        return IssueCommand::Pick(index);
    }

    if looks_like_issue_key(input) {
        return IssueCommand::Lookup(input.to_uppercase());
    }

    IssueCommand::Invalid(format!("Invalid input: '{}'", input))
}

/// Paginated issue search and pick
#[derive(Debug, Clone, Default)]
pub struct SelectIssueStep {
    preselect: Option<String>,
    filter: Option<String>,
    page_size: Option<usize>,
}

impl SelectIssueStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select this key directly if the tracker knows it
    pub fn with_issue(mut self, key: Option<String>) -> Self {
        self.preselect = key;
        self
    }

    /// Start with a search filter instead of the full list
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter.filter(|f| !f.trim().is_empty());
        self
    }

    /// Override the configured page size
    pub fn with_page_size(mut self, limit: Option<usize>) -> Self {
        self.page_size = limit;
        self
    }

    fn fetch(
        ctx: &mut StepContext<'_>,
        filter: Option<String>,
        page: usize,
        limit: usize,
    ) -> Result<IssuePage, StepError> {
        let tracker = Arc::clone(&ctx.clients().issues);
        ctx.run_remote("Fetching issues...", move || {
            Ok(tracker.search(filter.as_deref(), page, limit)?)
        })
    }

    /// Look a key up through the tracker; `None` when it does not exist
    fn find_by_key(
        ctx: &mut StepContext<'_>,
        key: &str,
        limit: usize,
    ) -> Result<Option<Issue>, StepError> {
        let page = Self::fetch(ctx, Some(key.to_string()), 1, limit)?;
        Ok(page
            .issues
            .into_iter()
            .find(|issue| issue.key.eq_ignore_ascii_case(key)))
    }

    fn chosen(ctx: &mut StepContext<'_>, issue: &Issue) -> Option<Value> {
        ctx.notify(
            Notice::Success,
            &format!("Selected: {} - {}", issue.key, issue.summary),
        );
        Some(to_result(issue))
    }

    fn select(&self, ctx: &mut StepContext<'_>) -> Result<Option<Value>, StepError> {
        let limit = self
            .page_size
            .unwrap_or(ctx.settings().issue_page_size)
            .max(1);

        if let Some(db) = ctx.stored_as::<DbSelection>(DB_SELECTION_KEY) {
            ctx.notify(Notice::Info, &format!("Filtering issues for DB: {}", db));
        }

        if let Some(key) = &self.preselect {
            match Self::find_by_key(ctx, key, limit)? {
                Some(issue) => return Ok(Self::chosen(ctx, &issue)),
                None => ctx.notify(Notice::Warning, &format!("Issue {} not found", key)),
            }
        }

        let mut filter = self.filter.clone();
        let mut page_no = 1;

        loop {
            let page = Self::fetch(ctx, filter.clone(), page_no, limit)?;
            debug!(page = page_no, total = page.total, "Fetched issue page");

            if page.issues.is_empty() {
                match filter.take() {
                    Some(text) => {
                        ctx.notify(
                            Notice::Warning,
                            &format!("No issues match '{}', showing all issues", text),
                        );
                        page_no = 1;
                        continue;
                    }
                    None if page_no > 1 => {
                        page_no = 1;
                        continue;
                    }
                    None => return Err(StepError::Unavailable("No issues found".to_string())),
                }
            }

            ctx.show(&render::issue_table(&page));

            loop {
                let input = ctx.prompter().input(ISSUE_PROMPT, None)?;
                match parse_issue_command(&input, &page.issues) {
                    IssueCommand::Next if page.has_next() => {
                        page_no += 1;
                        break;
                    }
                    IssueCommand::Next => ctx.notify(Notice::Warning, "Already on last page"),
                    IssueCommand::Previous if page.has_previous() => {
                        page_no -= 1;
                        break;
                    }
                    IssueCommand::Previous => {
                        ctx.notify(Notice::Warning, "Already on first page")
                    }
                    IssueCommand::Search => {
                        let text = ctx
                            .prompter()
                            .input("Search text (empty to show all)", None)?;
                        let text = text.trim();
                        filter = (!text.is_empty()).then(|| text.to_string());
                        page_no = 1;
                        break;
                    }
                    IssueCommand::Quit => return Ok(None),
                    IssueCommand::Pick(index) => {
                        let issue = page.issues[index].clone();
                        return Ok(Self::chosen(ctx, &issue));
                    }
                    IssueCommand::Lookup(key) => match Self::find_by_key(ctx, &key, limit)? {
                        Some(issue) => return Ok(Self::chosen(ctx, &issue)),
                        None => ctx.notify(Notice::Error, &format!("Issue {} not found", key)),
                    },
                    IssueCommand::Empty => {}
                    IssueCommand::Invalid(message) => ctx.notify(Notice::Error, &message),
                }
            }
        }
    }
}

impl Step for SelectIssueStep {
    fn name(&self) -> &str {
        SELECT_ISSUE_STEP
    }

    fn order(&self) -> u32 {
        30
    }

    fn title(&self) -> &str {
        "Select Jira Issue"
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> StepOutcome {
        self.select(ctx).into()
    }

    fn requires_session(&self) -> bool {
        true
    }

    fn persist_key(&self) -> Option<&str> {
        Some(ISSUE_SELECTION_KEY)
    }

    fn describe(&self, result: &Value) -> String {
        serde_json::from_value::<Issue>(result.clone())
            .map(|issue| format!("{} - {}", issue.key, issue.summary))
            .unwrap_or_else(|_| result.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::providers::OfflineIssueTracker;
    use crate::api::RemoteClients;
    use crate::config::Config;
    use crate::dispatcher::TaskDispatcher;
    use crate::store::PersistentStore;
    use crate::ui::ScriptedPrompter;
    use crate::wizard::ErrorKind;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn issue(key: &str) -> Issue {
        Issue {
            key: key.to_string(),
            summary: format!("Summary of {}", key),
            status: "Open".to_string(),
            assignee: "Unassigned".to_string(),
        }
    }

    fn run_with(
        step: &SelectIssueStep,
        prompter: &mut ScriptedPrompter,
        clients: RemoteClients,
        store: &PersistentStore,
    ) -> StepOutcome {
        let config = Config::default();
        let dispatcher = TaskDispatcher::new(Duration::from_millis(20)).unwrap();
        let mut ctx = StepContext::new(
            prompter,
            &dispatcher,
            &clients,
            &config.wizard,
            store,
            None,
        );
        step.run(&mut ctx)
    }

    fn run(step: &SelectIssueStep, prompter: &mut ScriptedPrompter) -> StepOutcome {
        let dir = TempDir::new().unwrap();
        let store = PersistentStore::empty(dir.path().join("state.json"));
        run_with(
            step,
            prompter,
            RemoteClients::offline(&Config::default()),
            &store,
        )
    }

    fn picked_key(outcome: StepOutcome) -> String {
        match outcome {
            StepOutcome::Success(value) => value["key"].as_str().unwrap().to_string(),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_parse_commands() {
        let issues = vec![issue("PROJ-101"), issue("PROJ-102")];
        assert_eq!(parse_issue_command("N", &issues), IssueCommand::Next);
        assert_eq!(parse_issue_command("prev", &issues), IssueCommand::Previous);
        assert_eq!(parse_issue_command("s", &issues), IssueCommand::Search);
        assert_eq!(parse_issue_command("q", &issues), IssueCommand::Quit);
        assert_eq!(parse_issue_command("2", &issues), IssueCommand::Pick(1));
        assert_eq!(parse_issue_command("proj-101", &issues), IssueCommand::Pick(0));
        assert_eq!(
            parse_issue_command("proj-200", &issues),
            IssueCommand::Lookup("PROJ-200".to_string())
        );
        assert_eq!(parse_issue_command("", &issues), IssueCommand::Empty);
        assert!(matches!(
            parse_issue_command("3", &issues),
            IssueCommand::Invalid(_)
        ));
        assert!(matches!(
            parse_issue_command("hello", &issues),
            IssueCommand::Invalid(_)
        ));
    }

    #[test]
    fn test_page_through_and_pick() {
        let mut prompter = ScriptedPrompter::new().text("n").text("n").text("2");
        let transcript = prompter.transcript();

        let key = picked_key(run(&SelectIssueStep::new(), &mut prompter));

        assert_eq!(key, "PROJ-112");
        assert!(transcript.contains("Jira Issues (Page 1/2, Total: 12)"));
        assert!(transcript.contains("Already on last page"));
    }

    #[test]
    fn test_pick_by_key_off_page() {
        let mut prompter = ScriptedPrompter::new().text("proj-111");
        let key = picked_key(run(
            &SelectIssueStep::new().with_page_size(Some(5)),
            &mut prompter,
        ));
        assert_eq!(key, "PROJ-111");
    }

    #[test]
    fn test_search_narrows_list() {
        let mut prompter = ScriptedPrompter::new()
            .text("s")
            .text("login")
            .text("1");
        let transcript = prompter.transcript();

        let key = picked_key(run(&SelectIssueStep::new(), &mut prompter));

        assert_eq!(key, "PROJ-111");
        assert!(transcript.contains("Jira Issues (Page 1/1, Total: 1)"));
    }

    #[test]
    fn test_preselected_issue() {
        let mut prompter = ScriptedPrompter::new();
        let step = SelectIssueStep::new().with_issue(Some("proj-104".into()));
        assert_eq!(picked_key(run(&step, &mut prompter)), "PROJ-104");
    }

    #[test]
    fn test_db_hint_and_empty_tracker() {
        let dir = TempDir::new().unwrap();
        let mut store = PersistentStore::empty(dir.path().join("state.json"));
        store
            .set(
                DB_SELECTION_KEY,
                json!({"db1": "Test Database", "db2": "Schema A", "db3": "Logs Table"}),
            )
            .unwrap();

        let config = Config::default();
        let offline = RemoteClients::offline(&config);
        let clients = RemoteClients::new(
            offline.auth.clone(),
            offline.catalog.clone(),
            Arc::new(OfflineIssueTracker::with_issues(Vec::new())),
        );
        let mut prompter = ScriptedPrompter::new();
        let transcript = prompter.transcript();

        match run_with(&SelectIssueStep::new(), &mut prompter, clients, &store) {
            StepOutcome::Failure(err) => assert_eq!(err.kind(), ErrorKind::Transient),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(transcript.contains("Filtering issues for DB: Test Database / Schema A / Logs Table"));
    }
}
