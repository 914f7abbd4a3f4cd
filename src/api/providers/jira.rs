//! Jira Cloud collaborators

use std::env;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use backon::{BlockingRetryable, ExponentialBuilder};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{looks_like_issue_key, AuthClient, Issue, IssuePage, IssueTracker, Session};
use crate::api::error::ApiError;
use crate::config::JiraConfig;

const PROVIDER_NAME: &str = "jira";

/// Email and API token shared by the Jira clients of one run.
///
/// A successful login stores the credentials it used so later searches run
/// as the same user. Nothing here is ever persisted.
#[derive(Clone, Default)]
pub struct JiraCredentials {
    inner: Arc<RwLock<Option<(String, String)>>>,
}

impl JiraCredentials {
    /// Seed from environment variables
    ///
    /// - TM_SETTER_JIRA_EMAIL: Your Atlassian account email
    /// - TM_SETTER_JIRA_TOKEN: Your Jira API token
    pub fn from_env() -> Self {
        let credentials = Self::default();
        if let (Ok(email), Ok(token)) = (
            env::var("TM_SETTER_JIRA_EMAIL"),
            env::var("TM_SETTER_JIRA_TOKEN"),
        ) {
            if !email.is_empty() && !token.is_empty() {
                credentials.set(&email, &token);
            }
        }
        credentials
    }

    pub fn set(&self, email: &str, token: &str) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some((email.to_string(), token.to_string()));
    }

    pub fn get(&self) -> Option<(String, String)> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl fmt::Debug for JiraCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let email = self.get().map(|(email, _)| email);
        f.debug_struct("JiraCredentials")
            .field("email", &email)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// HTTP plumbing shared by the Jira clients
#[derive(Clone)]
struct JiraHttp {
    domain: String,
    client: Client,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl JiraHttp {
    fn new(config: &JiraConfig, domain: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

        Ok(Self {
            domain: domain.trim_end_matches('/').to_string(),
            client,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        })
    }

    /// Get the base URL for API requests
    fn base_url(&self) -> String {
        if self.domain.starts_with("http://") || self.domain.starts_with("https://") {
            format!("{}/rest/api/3", self.domain)
        } else {
            format!("https://{}/rest/api/3", self.domain)
        }
    }

    /// Build the retry strategy
    fn retry_strategy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }

    /// Make one authenticated GET request
    fn get_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        (email, token): (&str, &str),
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url(), path);
        debug!("Jira GET: {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(email, Some(token))
            .header("Accept", "application/json")
            .query(query)
            .send()
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response.text().unwrap_or_default();
            return match status.as_u16() {
                401 => Err(ApiError::unauthorized(PROVIDER_NAME)),
                403 => Err(ApiError::forbidden(PROVIDER_NAME)),
                404 => Err(ApiError::http(
                    PROVIDER_NAME,
                    404,
                    format!("Not found: {}", path),
                )),
                429 => Err(ApiError::rate_limited(PROVIDER_NAME, retry_after)),
                _ => Err(ApiError::http(PROVIDER_NAME, status.as_u16(), body)),
            };
        }

        response
            .json()
            .map_err(|e| ApiError::http(PROVIDER_NAME, 0, format!("Parse error: {}", e)))
    }

    /// Transient failures are retried, unless the server asked us to wait
    /// longer than the backoff ever would
    fn should_retry(&self, err: &ApiError) -> bool {
        err.is_transient()
            && err
                .retry_after()
                .map_or(true, |secs| Duration::from_secs(secs) <= self.max_delay)
    }

    /// GET with exponential backoff on transient failures
    fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        credentials: (&str, &str),
    ) -> Result<T, ApiError> {
        let op = || self.get_once::<T>(path, query, credentials);

        op.retry(self.retry_strategy())
            .sleep(std::thread::sleep)
            .when(|err| self.should_retry(err))
            .notify(|err: &ApiError, dur: Duration| {
                warn!("Retrying Jira GET {} after {:?}: {}", path, dur, err);
            })
            .call()
    }
}

/// Verifies credentials against `/myself` and mints a local session
pub struct JiraAuthClient {
    http: JiraHttp,
    credentials: JiraCredentials,
    session_ttl: Duration,
}

impl JiraAuthClient {
    pub fn new(
        config: &JiraConfig,
        domain: &str,
        credentials: JiraCredentials,
        session_ttl: Duration,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            http: JiraHttp::new(config, domain)?,
            credentials,
            session_ttl,
        })
    }
}

#[derive(Debug, Deserialize)]
struct JiraMyself {
    #[serde(rename = "accountId")]
    #[allow(dead_code)]
    account_id: String,
}

impl AuthClient for JiraAuthClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn authenticate(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::invalid_credentials(
                PROVIDER_NAME,
                "email and API token are required",
            ));
        }

        match self
            .http
            .get::<JiraMyself>("/myself", &[], (username, password))
        {
            Ok(_) => {
                self.credentials.set(username, password);
                Ok(Session::issue(username, self.session_ttl))
            }
            Err(e) => {
                if e.is_auth_error() {
                    warn!("Jira authentication failed for {}", username);
                }
                Err(e)
            }
        }
    }
}

/// JQL text search over `/search`
pub struct JiraIssueTracker {
    http: JiraHttp,
    credentials: JiraCredentials,
}

impl JiraIssueTracker {
    pub fn new(
        config: &JiraConfig,
        domain: &str,
        credentials: JiraCredentials,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            http: JiraHttp::new(config, domain)?,
            credentials,
        })
    }
}

// Jira API response types
#[derive(Debug, Deserialize)]
struct JiraSearchResponse {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Debug, Deserialize)]
struct JiraIssue {
    key: String,
    fields: JiraIssueFields,
}

#[derive(Debug, Deserialize)]
struct JiraIssueFields {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    status: Option<JiraStatus>,
    #[serde(default)]
    assignee: Option<JiraUser>,
}

#[derive(Debug, Deserialize)]
struct JiraStatus {
    name: String,
}

#[derive(Debug, Deserialize)]
struct JiraUser {
    #[serde(rename = "displayName")]
    display_name: String,
}

impl JiraIssue {
    fn into_issue(self) -> Issue {
        Issue {
            key: self.key,
            summary: self.fields.summary.unwrap_or_default(),
            status: self
                .fields
                .status
                .map(|s| s.name)
                .unwrap_or_else(|| "Unknown".to_string()),
            assignee: self
                .fields
                .assignee
                .map(|a| a.display_name)
                .unwrap_or_else(|| "Unassigned".to_string()),
        }
    }
}

fn escape_jql(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// JQL for a picker filter: exact key lookup for key-shaped input, full-text
/// search otherwise
fn build_jql(filter: Option<&str>) -> String {
    const ORDER: &str = "ORDER BY updated DESC";
    match filter.map(str::trim).filter(|f| !f.is_empty()) {
        Some(text) if looks_like_issue_key(text) => {
            format!("key = \"{}\" {}", escape_jql(&text.to_uppercase()), ORDER)
        }
        Some(text) => format!("text ~ \"{}\" {}", escape_jql(text), ORDER),
        None => ORDER.to_string(),
    }
}

impl IssueTracker for JiraIssueTracker {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn search(
        &self,
        filter: Option<&str>,
        page: usize,
        limit: usize,
    ) -> Result<IssuePage, ApiError> {
        let (email, token) = self
            .credentials
            .get()
            .ok_or_else(|| ApiError::not_configured(PROVIDER_NAME))?;

        let page = page.max(1);
        let limit = limit.max(1);
        let query = [
            ("jql", build_jql(filter)),
            ("startAt", ((page - 1) * limit).to_string()),
            ("maxResults", limit.to_string()),
            ("fields", "summary,status,assignee".to_string()),
        ];

        let response: JiraSearchResponse = self.http.get("/search", &query, (&email, &token))?;
        debug!(
            total = response.total,
            returned = response.issues.len(),
            "Jira search complete"
        );

        Ok(IssuePage {
            issues: response.issues.into_iter().map(JiraIssue::into_issue).collect(),
            total: response.total,
            page,
            page_size: limit,
        })
    }
}
