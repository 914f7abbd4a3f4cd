//! Remote collaborator traits and implementations
//!
//! The wizard talks to three narrow interfaces: an [`AuthClient`] that turns
//! credentials into a [`Session`], a [`ResourceCatalog`] that lists selectable
//! options, and an [`IssueTracker`] that searches issues page by page. Every
//! call is blocking and is expected to run as dispatcher work, never on the
//! thread that owns the prompts.

mod jira;
mod offline;

pub use jira::{JiraAuthClient, JiraCredentials, JiraIssueTracker};
pub use offline::{OfflineAuthClient, OfflineCatalog, OfflineIssueTracker};

use std::fmt;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::api::error::ApiError;

static ISSUE_KEY: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]+-\d+$").ok());

/// Whether `text` has the shape of an issue key such as `PROJ-123`
pub fn looks_like_issue_key(text: &str) -> bool {
    ISSUE_KEY
        .as_ref()
        .is_some_and(|re| re.is_match(text.trim()))
}

/// Current wall-clock time as fractional unix seconds
pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// An authenticated session as persisted under the `session` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    /// Unix seconds after which the session is no longer valid
    pub expires_at: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<f64>,
}

impl Session {
    /// Mint a fresh session for `username` valid for `ttl`
    pub fn issue(username: &str, ttl: Duration) -> Self {
        let created_at = now_secs();
        let nonce = uuid::Uuid::new_v4();

        let mut hasher = Sha256::new();
        hasher.update(username.as_bytes());
        hasher.update(b":");
        hasher.update(nonce.as_bytes());
        hasher.update(b":");
        hasher.update(created_at.to_string().as_bytes());
        let token = format!("{:x}", hasher.finalize());

        Self {
            token,
            username: username.to_string(),
            expires_at: created_at + ttl.as_secs_f64(),
            created_at: Some(created_at),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_secs())
    }

    pub fn is_valid_at(&self, now: f64) -> bool {
        !self.token.is_empty() && now < self.expires_at
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self) -> Duration {
        Duration::from_secs_f64((self.expires_at - now_secs()).max(0.0))
    }
}

/// What a [`ResourceCatalog`] is asked to list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    /// Options for database level 1..=3; `parents` holds the choices made on
    /// the levels above, in order
    Database { level: u8, parents: Vec<String> },
    Repository,
    Version,
}

impl fmt::Display for CatalogQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogQuery::Database { level, .. } => write!(f, "database level {}", level),
            CatalogQuery::Repository => write!(f, "repositories"),
            CatalogQuery::Version => write!(f, "versions"),
        }
    }
}

/// An issue as shown in the picker and stored under `issue_selection`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    pub summary: String,
    pub status: String,
    pub assignee: String,
}

impl Issue {
    /// Case-insensitive substring match on key, summary or status
    pub fn matches(&self, filter: &str) -> bool {
        let needle = filter.to_lowercase();
        self.key.to_lowercase().contains(&needle)
            || self.summary.to_lowercase().contains(&needle)
            || self.status.to_lowercase().contains(&needle)
    }
}

/// One page of search results. `page` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuePage {
    pub issues: Vec<Issue>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl IssuePage {
    pub fn total_pages(&self) -> usize {
        if self.total == 0 || self.page_size == 0 {
            1
        } else {
            self.total.div_ceil(self.page_size)
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Turns a username and password into a session
pub trait AuthClient: Send + Sync {
    /// Provider name used in errors and logs (e.g. "jira", "offline")
    fn name(&self) -> &str;

    fn authenticate(&self, username: &str, password: &str) -> Result<Session, ApiError>;
}

/// Lists the options offered by the selection steps
pub trait ResourceCatalog: Send + Sync {
    fn name(&self) -> &str;

    fn list(&self, query: &CatalogQuery) -> Result<Vec<String>, ApiError>;
}

/// Searches issues a page at a time
pub trait IssueTracker: Send + Sync {
    fn name(&self) -> &str;

    /// Search issues matching `filter` (all issues when `None`). `page` is
    /// 1-based; `limit` is the page size.
    fn search(&self, filter: Option<&str>, page: usize, limit: usize)
        -> Result<IssuePage, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_session_is_valid_for_ttl() {
        let session = Session::issue("john.doe", Duration::from_secs(3600));
        assert_eq!(session.username, "john.doe");
        assert_eq!(session.token.len(), 64);
        assert!(session.is_valid());
        assert!(!session.is_valid_at(session.expires_at + 1.0));
        assert!(session.remaining() > Duration::from_secs(3500));
    }

    #[test]
    fn test_tokens_are_unique_per_issue() {
        let a = Session::issue("john.doe", Duration::from_secs(60));
        let b = Session::issue("john.doe", Duration::from_secs(60));
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_session_json_shape() {
        let session = Session {
            token: "abc".to_string(),
            username: "jane".to_string(),
            expires_at: 1700000000.5,
            created_at: None,
        };
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["expires_at"], serde_json::json!(1700000000.5));
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn test_issue_page_navigation() {
        let page = IssuePage {
            issues: vec![],
            total: 12,
            page: 1,
            page_size: 10,
        };
        assert_eq!(page.total_pages(), 2);
        assert!(page.has_next());
        assert!(!page.has_previous());

        let empty = IssuePage {
            issues: vec![],
            total: 0,
            page: 1,
            page_size: 10,
        };
        assert_eq!(empty.total_pages(), 1);
        assert!(!empty.has_next());
    }

    #[test]
    fn test_looks_like_issue_key() {
        assert!(looks_like_issue_key("PROJ-123"));
        assert!(looks_like_issue_key("proj-7"));
        assert!(!looks_like_issue_key("PROJ"));
        assert!(!looks_like_issue_key("connection pool"));
        assert!(!looks_like_issue_key("1PROJ-2"));
    }

    #[test]
    fn test_issue_matches_key_summary_status() {
        let issue = Issue {
            key: "PROJ-102".to_string(),
            summary: "Fix database connection pool".to_string(),
            status: "In Progress".to_string(),
            assignee: "Jane Smith".to_string(),
        };
        assert!(issue.matches("proj-10"));
        assert!(issue.matches("CONNECTION"));
        assert!(issue.matches("progress"));
        assert!(!issue.matches("Jane"));
    }
}
