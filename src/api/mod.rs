//! Remote service clients used by the wizard steps
//!
//! This module provides:
//! - Collaborator traits for authentication, catalog lookup and issue search
//! - Jira-backed and offline implementations
//! - [`RemoteClients`], the bundle a wizard run is built with

pub mod error;
pub mod providers;

pub use error::ApiError;
pub use providers::{
    AuthClient, CatalogQuery, Issue, IssuePage, IssueTracker, ResourceCatalog, Session,
};

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use providers::{
    JiraAuthClient, JiraCredentials, JiraIssueTracker, OfflineAuthClient, OfflineCatalog,
    OfflineIssueTracker,
};

/// The collaborators of one wizard run
///
/// Clients are shared with dispatcher work through `Arc`, so a step can move
/// a handle into the closure it submits.
#[derive(Clone)]
pub struct RemoteClients {
    pub auth: Arc<dyn AuthClient>,
    pub catalog: Arc<dyn ResourceCatalog>,
    pub issues: Arc<dyn IssueTracker>,
}

impl RemoteClients {
    pub fn new(
        auth: Arc<dyn AuthClient>,
        catalog: Arc<dyn ResourceCatalog>,
        issues: Arc<dyn IssueTracker>,
    ) -> Self {
        Self {
            auth,
            catalog,
            issues,
        }
    }

    /// Build clients from configuration
    ///
    /// A configured Jira domain (`jira.domain` or `TM_SETTER_JIRA_DOMAIN`)
    /// enables Jira authentication and issue search. The catalog is always
    /// served from `[catalog]`.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let ttl = config.wizard.session_ttl();
        let catalog: Arc<dyn ResourceCatalog> =
            Arc::new(OfflineCatalog::new(config.catalog.clone()));

        match config.jira.effective_domain() {
            Some(domain) => {
                info!("Using Jira at {}", domain);
                let credentials = JiraCredentials::from_env();
                let auth = JiraAuthClient::new(&config.jira, &domain, credentials.clone(), ttl)?;
                let issues = JiraIssueTracker::new(&config.jira, &domain, credentials)?;
                Ok(Self::new(Arc::new(auth), catalog, Arc::new(issues)))
            }
            None => {
                info!("No Jira domain configured, using offline clients");
                Ok(Self::offline(config))
            }
        }
    }

    /// Offline clients only
    pub fn offline(config: &Config) -> Self {
        Self::new(
            Arc::new(OfflineAuthClient::new(config.wizard.session_ttl())),
            Arc::new(OfflineCatalog::new(config.catalog.clone())),
            Arc::new(OfflineIssueTracker::new()),
        )
    }

    /// Provider name behind issue search, for display
    pub fn issue_provider(&self) -> &str {
        self.issues.name()
    }
}
