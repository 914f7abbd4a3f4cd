//! Plain-text blocks shown through [`Prompter::show`](super::Prompter::show)
//!
//! Everything here is a pure function of its input so output can be checked
//! in tests without a terminal.

use crate::api::IssuePage;
use crate::wizard::{StepMark, Summary, WizardView};

const SUMMARY_WIDTH: usize = 50;
const RULE: &str = "============================================================";

pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Banner printed when a step starts
pub fn step_header(index: usize, total: usize, title: &str) -> String {
    format!("\n{}\n[Step {}/{}] {}\n{}", RULE, index + 1, total, title, RULE)
}

/// Numbered options, laid out row by row over `columns` columns
pub fn option_list(title: &str, options: &[String], columns: usize) -> String {
    let columns = columns.max(1);
    let number_width = options.len().to_string().len();
    let cell_width = options
        .iter()
        .map(|o| o.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = format!("\n{}:", title);
    for (row, chunk) in options.chunks(columns).enumerate() {
        let cells: Vec<String> = chunk
            .iter()
            .enumerate()
            .map(|(col, option)| {
                let number = row * columns + col + 1;
                format!(
                    "{:>nw$}. {:<cw$}",
                    number,
                    option,
                    nw = number_width,
                    cw = cell_width
                )
            })
            .collect();
        out.push_str("\n  ");
        out.push_str(cells.join("   ").trim_end());
    }
    out
}

/// Issue page as a numbered table
pub fn issue_table(page: &IssuePage) -> String {
    let mut out = format!(
        "\nJira Issues (Page {}/{}, Total: {})\n",
        page.page,
        page.total_pages(),
        page.total
    );
    out.push_str(&format!(
        "{:>3}  {:<12} {:<50} {:<14} {}\n",
        "#", "Key", "Summary", "Status", "Assignee"
    ));
    out.push_str(&"-".repeat(100));

    for (index, issue) in page.issues.iter().enumerate() {
        out.push_str(&format!(
            "\n{:>3}  {:<12} {:<50} {:<14} {}",
            index + 1,
            issue.key,
            truncate(&issue.summary, SUMMARY_WIDTH),
            issue.status,
            issue.assignee
        ));
    }
    out
}

/// End-of-run summary of the collected selections
pub fn summary(summary: &Summary) -> String {
    let unset = "(not set)";
    let mut out = String::from("\nSummary:");

    out.push_str(&format!(
        "\n  User: {}",
        summary.user.as_deref().unwrap_or(unset)
    ));
    match &summary.db_selection {
        Some(db) => out.push_str(&format!("\n  DB Code: {}", db)),
        None => out.push_str(&format!("\n  DB Code: {}", unset)),
    }
    match &summary.issue {
        Some(issue) => out.push_str(&format!("\n  Issue: {} - {}", issue.key, issue.summary)),
        None => out.push_str(&format!("\n  Issue: {}", unset)),
    }

    let (repo, version) = match &summary.configuration {
        Some(config) => (
            config.repo.as_deref().unwrap_or("(skipped)"),
            config.version.as_deref().unwrap_or("(skipped)"),
        ),
        None => (unset, unset),
    };
    out.push_str(&format!("\n  Repository: {}", repo));
    out.push_str(&format!("\n  Version: {}", version));
    out
}

/// Step checklist with the current position
pub fn progress(view: &WizardView) -> String {
    let mut out = String::from("\nProgress:");
    for (index, line) in view.steps.iter().enumerate() {
        let mark = match line.mark {
            StepMark::Done => "✓",
            StepMark::Current => "▶",
            StepMark::Pending => "·",
        };
        out.push_str(&format!("\n  {} {}. {}", mark, index + 1, line.title));
        if let Some(detail) = &line.detail {
            out.push_str(&format!(" ({})", detail));
        }
    }
    if let (Some(user), Some(left)) = (&view.session_user, view.session_expires_in) {
        out.push_str(&format!(
            "\n  Session: {} ({} min left)",
            user,
            left.as_secs() / 60
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Issue;
    use crate::steps::{Configuration, DbSelection};

    fn issues(n: usize) -> Vec<Issue> {
        (0..n)
            .map(|i| Issue {
                key: format!("PROJ-{}", 101 + i),
                summary: format!("Issue number {}", i),
                status: "Open".to_string(),
                assignee: "Unassigned".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        let long = "x".repeat(60);
        let cut = truncate(&long, 50);
        assert_eq!(cut.chars().count(), 50);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_issue_table_header() {
        let page = IssuePage {
            issues: issues(2),
            total: 12,
            page: 2,
            page_size: 10,
        };
        let table = issue_table(&page);
        assert!(table.contains("Jira Issues (Page 2/2, Total: 12)"));
        assert!(table.contains("PROJ-102"));
    }

    #[test]
    fn test_option_list_columns() {
        let options: Vec<String> = (1..=5).map(|i| format!("opt{}", i)).collect();
        let block = option_list("Pick", &options, 3);
        let lines: Vec<&str> = block.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines[0], "Pick:");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("1. opt1") && lines[1].contains("3. opt3"));
        assert!(lines[2].contains("5. opt5"));
    }

    #[test]
    fn test_summary_lines() {
        let summary = Summary {
            user: Some("john.doe".into()),
            db_selection: Some(DbSelection {
                db1: "a".into(),
                db2: "b".into(),
                db3: "c".into(),
            }),
            issue: issues(1).pop(),
            configuration: Some(Configuration {
                repo: Some("frontend-app".into()),
                version: None,
            }),
        };
        let text = super::summary(&summary);
        assert!(text.contains("User: john.doe"));
        assert!(text.contains("DB Code: a / b / c"));
        assert!(text.contains("Issue: PROJ-101 - Issue number 0"));
        assert!(text.contains("Repository: frontend-app"));
        assert!(text.contains("Version: (skipped)"));
    }

    #[test]
    fn test_step_header() {
        assert!(step_header(0, 4, "User Authentication").contains("[Step 1/4] User Authentication"));
    }
}
