//! Offline collaborators backed by configuration and built-in sample data.
//!
//! Used whenever no Jira domain is configured, and by the tests.

use std::time::Duration;

use tracing::debug;

use super::{AuthClient, CatalogQuery, Issue, IssuePage, IssueTracker, ResourceCatalog, Session};
use crate::api::error::ApiError;
use crate::config::CatalogConfig;

const PROVIDER_NAME: &str = "offline";

/// Accepts any non-empty username/password pair
pub struct OfflineAuthClient {
    session_ttl: Duration,
}

impl OfflineAuthClient {
    pub fn new(session_ttl: Duration) -> Self {
        Self { session_ttl }
    }
}

impl AuthClient for OfflineAuthClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn authenticate(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ApiError::invalid_credentials(
                PROVIDER_NAME,
                "username and password are required",
            ));
        }

        debug!(username = %username, "Issuing offline session");
        Ok(Session::issue(username.trim(), self.session_ttl))
    }
}

/// Serves the option lists from `[catalog]`
pub struct OfflineCatalog {
    catalog: CatalogConfig,
}

impl OfflineCatalog {
    pub fn new(catalog: CatalogConfig) -> Self {
        Self { catalog }
    }

    fn schemas_for(&self, database: &str) -> Vec<String> {
        // Layered config may lowercase map keys, so compare case-insensitively
        self.catalog
            .schemas_by_database
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(database))
            .map(|(_, schemas)| schemas.clone())
            .unwrap_or_else(|| self.catalog.default_schemas.clone())
    }
}

impl ResourceCatalog for OfflineCatalog {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn list(&self, query: &CatalogQuery) -> Result<Vec<String>, ApiError> {
        match query {
            CatalogQuery::Database { level: 1, .. } => Ok(self.catalog.databases.clone()),
            CatalogQuery::Database { level: 2, parents } => match parents.first() {
                Some(database) => Ok(self.schemas_for(database)),
                None => Err(ApiError::http(
                    PROVIDER_NAME,
                    400,
                    "level 2 needs a level 1 selection",
                )),
            },
            CatalogQuery::Database { level: 3, .. } => Ok(self.catalog.tables.clone()),
            CatalogQuery::Database { level, .. } => Err(ApiError::http(
                PROVIDER_NAME,
                400,
                format!("unknown database level {}", level),
            )),
            CatalogQuery::Repository => Ok(self.catalog.repositories.clone()),
            CatalogQuery::Version => Ok(self.catalog.versions.clone()),
        }
    }
}

/// In-memory issue list with substring filtering and paging
pub struct OfflineIssueTracker {
    issues: Vec<Issue>,
}

impl Default for OfflineIssueTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineIssueTracker {
    /// Tracker seeded with the sample project issues
    pub fn new() -> Self {
        Self::with_issues(sample_issues())
    }

    pub fn with_issues(issues: Vec<Issue>) -> Self {
        Self { issues }
    }
}

impl IssueTracker for OfflineIssueTracker {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn search(
        &self,
        filter: Option<&str>,
        page: usize,
        limit: usize,
    ) -> Result<IssuePage, ApiError> {
        let page = page.max(1);
        let limit = limit.max(1);

        let matching: Vec<&Issue> = match filter.map(str::trim).filter(|f| !f.is_empty()) {
            Some(text) => self.issues.iter().filter(|i| i.matches(text)).collect(),
            None => self.issues.iter().collect(),
        };

        let total = matching.len();
        let issues = matching
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .cloned()
            .collect();

        Ok(IssuePage {
            issues,
            total,
            page,
            page_size: limit,
        })
    }
}

fn sample_issues() -> Vec<Issue> {
    [
        ("PROJ-101", "Implement user authentication", "Open", "John Doe"),
        ("PROJ-102", "Fix database connection pool", "In Progress", "Jane Smith"),
        ("PROJ-103", "Update API documentation", "Todo", "Unassigned"),
        ("PROJ-104", "Optimize query performance", "In Review", "Bob Wilson"),
        ("PROJ-105", "Add unit tests for service layer", "Open", "Alice Brown"),
        ("PROJ-106", "Refactor legacy code", "Todo", "Unassigned"),
        ("PROJ-107", "Implement caching mechanism", "In Progress", "Charlie Davis"),
        ("PROJ-108", "Security audit findings", "Open", "David Lee"),
        ("PROJ-109", "Migrate to new infrastructure", "Planning", "Eve Martinez"),
        ("PROJ-110", "Performance monitoring setup", "Done", "Frank Garcia"),
        ("PROJ-111", "Bug fix for login issue", "In Progress", "Grace Kim"),
        ("PROJ-112", "Feature: Dark mode support", "Open", "Henry Chen"),
    ]
    .into_iter()
    .map(|(key, summary, status, assignee)| Issue {
        key: key.to_string(),
        summary: summary.to_string(),
        status: status.to_string(),
        assignee: assignee.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_offline_auth_rejects_empty_credentials() {
        let auth = OfflineAuthClient::new(Duration::from_secs(3600));
        let err = auth.authenticate("john.doe", "").unwrap_err();
        assert!(err.is_auth_error());
        assert!(auth.authenticate("  ", "secret").is_err());

        let session = auth.authenticate("john.doe", "secret").unwrap();
        assert_eq!(session.username, "john.doe");
    }

    #[test]
    fn test_catalog_cascades_schemas() {
        let catalog = OfflineCatalog::new(CatalogConfig::default());

        let production = catalog
            .list(&CatalogQuery::Database {
                level: 2,
                parents: vec!["Production Database".to_string()],
            })
            .unwrap();
        assert_eq!(production, vec!["Main Schema", "Backup Schema", "Archive Schema"]);

        let other = catalog
            .list(&CatalogQuery::Database {
                level: 2,
                parents: vec!["Test Database".to_string()],
            })
            .unwrap();
        assert_eq!(other, vec!["Schema A", "Schema B", "Schema C", "Schema D"]);
    }

    #[test]
    fn test_catalog_schema_lookup_ignores_key_case() {
        let mut config = CatalogConfig::default();
        config.schemas_by_database = HashMap::from([(
            "staging database".to_string(),
            vec!["Blue".to_string(), "Green".to_string()],
        )]);
        let catalog = OfflineCatalog::new(config);

        let schemas = catalog
            .list(&CatalogQuery::Database {
                level: 2,
                parents: vec!["Staging Database".to_string()],
            })
            .unwrap();
        assert_eq!(schemas, vec!["Blue", "Green"]);
    }

    #[test]
    fn test_catalog_rejects_unknown_level() {
        let catalog = OfflineCatalog::new(CatalogConfig::default());
        let err = catalog
            .list(&CatalogQuery::Database {
                level: 4,
                parents: vec![],
            })
            .unwrap_err();
        assert!(!err.is_auth_error());
        assert!(err.to_string().contains("unknown database level 4"));
    }

    #[test]
    fn test_issue_search_pages() {
        let tracker = OfflineIssueTracker::new();

        let first = tracker.search(None, 1, 10).unwrap();
        assert_eq!(first.total, 12);
        assert_eq!(first.issues.len(), 10);
        assert!(first.has_next());

        let second = tracker.search(None, 2, 10).unwrap();
        assert_eq!(second.issues.len(), 2);
        assert_eq!(second.issues[0].key, "PROJ-111");
        assert!(!second.has_next());
    }

    #[test]
    fn test_issue_search_filters() {
        let tracker = OfflineIssueTracker::new();

        let page = tracker.search(Some("PROJ-10"), 1, 10).unwrap();
        assert_eq!(page.total, 9);

        let page = tracker.search(Some("in progress"), 1, 10).unwrap();
        let keys: Vec<&str> = page.issues.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["PROJ-102", "PROJ-107", "PROJ-111"]);

        let page = tracker.search(Some("nothing-matches"), 1, 10).unwrap();
        assert_eq!(page.total, 0);
        assert!(page.issues.is_empty());
    }
}
