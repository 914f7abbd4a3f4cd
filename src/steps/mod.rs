//! The concrete wizard steps
//!
//! Each step is a [`Step`] run by the controller. Remote lookups go through
//! [`StepContext::run_remote`](crate::wizard::StepContext::run_remote) so the
//! prompt thread never blocks on the network itself.

pub mod choice;
mod configure;
mod login;
mod select_db;
mod select_issue;

pub use configure::ConfigureStep;
pub use login::LoginStep;
pub use select_db::SelectDbStep;
pub use select_issue::{parse_issue_command, IssueCommand, SelectIssueStep};

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::wizard::Step;

/// Top-level store key of the chosen DB code
pub const DB_SELECTION_KEY: &str = "db_selection";
/// Top-level store key of the chosen issue
pub const ISSUE_SELECTION_KEY: &str = "issue_selection";
/// Top-level store key of the optional repository/version choice
pub const CONFIGURATION_KEY: &str = "configuration";

pub const LOGIN_STEP: &str = "login";
pub const SELECT_DB_STEP: &str = "select_db";
pub const SELECT_ISSUE_STEP: &str = "select_issue";
pub const CONFIGURE_STEP: &str = "configure";

/// The three-level DB code: database, schema, table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbSelection {
    pub db1: String,
    pub db2: String,
    pub db3: String,
}

impl fmt::Display for DbSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.db1, self.db2, self.db3)
    }
}

/// Repository and binary version; either may be skipped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub repo: Option<String>,
    pub version: Option<String>,
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}",
            self.repo.as_deref().unwrap_or("(skipped)"),
            self.version.as_deref().unwrap_or("(skipped)")
        )
    }
}

/// Serialize a step result; the types above always serialize
fn to_result<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// The full wizard, in run order
pub fn wizard_steps() -> Vec<Box<dyn Step>> {
    vec![
        Box::new(LoginStep::new()),
        Box::new(SelectDbStep::new()),
        Box::new(SelectIssueStep::new()),
        Box::new(ConfigureStep::new()),
    ]
}
