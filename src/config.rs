use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub wizard: WizardConfig,
    #[serde(default)]
    pub jira: JiraConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Persisted wizard document (session, selections, last_state)
    pub state_file: String,
    /// Directory for interactive-mode log files
    pub logs: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to log to file in interactive mode (false = stderr for debugging)
    #[serde(default = "default_log_to_file")]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_to_file() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: default_log_to_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardConfig {
    /// Failures allowed on an authenticating step before the wizard aborts
    #[serde(default = "default_auth_attempt_cap")]
    pub auth_attempt_cap: u32,
    /// Lifetime of a freshly issued session (default: 3600 = 1 hour)
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    /// Issues shown per page in the issue picker
    #[serde(default = "default_issue_page_size")]
    pub issue_page_size: usize,
    /// Bounded wait of the dispatcher worker between queue polls
    #[serde(default = "default_worker_poll_interval")]
    pub worker_poll_interval_ms: u64,
    /// How long shutdown waits for an in-flight task
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

fn default_auth_attempt_cap() -> u32 {
    3
}

fn default_session_ttl() -> u64 {
    3600 // 1 hour
}

fn default_issue_page_size() -> usize {
    10
}

fn default_worker_poll_interval() -> u64 {
    1000
}

fn default_shutdown_timeout() -> u64 {
    2000
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            auth_attempt_cap: default_auth_attempt_cap(),
            session_ttl_secs: default_session_ttl(),
            issue_page_size: default_issue_page_size(),
            worker_poll_interval_ms: default_worker_poll_interval(),
            shutdown_timeout_ms: default_shutdown_timeout(),
        }
    }
}

impl WizardConfig {
    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// Jira connection settings. Without a domain the offline clients are used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    /// Jira Cloud domain, e.g. "your-domain.atlassian.net"
    #[serde(default)]
    pub domain: Option<String>,
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_jira_timeout")]
    pub timeout_secs: u64,
    /// Retries for transient failures before the error reaches the wizard
    #[serde(default = "default_jira_retries")]
    pub max_retries: usize,
}

fn default_jira_timeout() -> u64 {
    30
}

fn default_jira_retries() -> usize {
    3
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            domain: None,
            timeout_secs: default_jira_timeout(),
            max_retries: default_jira_retries(),
        }
    }
}

impl JiraConfig {
    /// Domain from config, falling back to `TM_SETTER_JIRA_DOMAIN`
    pub fn effective_domain(&self) -> Option<String> {
        self.domain
            .clone()
            .or_else(|| std::env::var("TM_SETTER_JIRA_DOMAIN").ok())
            .filter(|d| !d.trim().is_empty())
    }
}

/// Option lists served by the offline resource catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_databases")]
    pub databases: Vec<String>,
    /// Schema options keyed by the selected database
    #[serde(default = "default_schemas_by_database")]
    pub schemas_by_database: HashMap<String, Vec<String>>,
    /// Schema options for databases without a dedicated entry
    #[serde(default = "default_schemas")]
    pub default_schemas: Vec<String>,
    #[serde(default = "default_tables")]
    pub tables: Vec<String>,
    #[serde(default = "default_repositories")]
    pub repositories: Vec<String>,
    #[serde(default = "default_versions")]
    pub versions: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn default_databases() -> Vec<String> {
    strings(&[
        "Production Database",
        "Development Database",
        "Test Database",
        "Staging Database",
        "Analytics Database",
    ])
}

fn default_schemas_by_database() -> HashMap<String, Vec<String>> {
    let mut map = HashMap::new();
    map.insert(
        "Production Database".to_string(),
        strings(&["Main Schema", "Backup Schema", "Archive Schema"]),
    );
    map
}

fn default_schemas() -> Vec<String> {
    strings(&["Schema A", "Schema B", "Schema C", "Schema D"])
}

fn default_tables() -> Vec<String> {
    strings(&[
        "Users Table",
        "Products Table",
        "Orders Table",
        "Transactions Table",
        "Logs Table",
        "Configuration Table",
    ])
}

fn default_repositories() -> Vec<String> {
    strings(&[
        "main-repository",
        "backend-services",
        "frontend-app",
        "mobile-app",
        "data-pipeline",
        "infrastructure",
        "documentation",
    ])
}

fn default_versions() -> Vec<String> {
    strings(&[
        "v3.0.0", "v2.5.1", "v2.5.0", "v2.4.3", "v2.4.2", "v2.4.1", "v2.4.0", "v2.3.0", "v2.2.0",
        "v2.1.0", "v2.0.0", "v1.9.0",
    ])
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            databases: default_databases(),
            schemas_by_database: default_schemas_by_database(),
            default_schemas: default_schemas(),
            tables: default_tables(),
            repositories: default_repositories(),
            versions: default_versions(),
        }
    }
}

/// Expand a leading `~/` against the user's home directory
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so tm-setter works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        // User config in ~/.config/tm-setter/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tm-setter").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with TM_SETTER_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("TM_SETTER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config to TOML")
    }

    /// Get absolute path to the persisted wizard document
    pub fn state_file_path(&self) -> PathBuf {
        let path = expand_home(&self.paths.state_file);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        let path = expand_home(&self.paths.logs);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                state_file: "~/.tm-setter/config.json".to_string(),
                logs: "~/.tm-setter/logs".to_string(),
            },
            logging: LoggingConfig::default(),
            wizard: WizardConfig::default(),
            jira: JiraConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_caps_and_page_size() {
        let config = Config::default();
        assert_eq!(config.wizard.auth_attempt_cap, 3);
        assert_eq!(config.wizard.session_ttl_secs, 3600);
        assert_eq!(config.wizard.issue_page_size, 10);
    }

    #[test]
    fn test_state_file_expands_home() {
        let config = Config::default();
        let path = config.state_file_path();
        assert!(path.is_absolute());
        assert!(path.ends_with(".tm-setter/config.json"));
    }

    #[test]
    fn test_relative_paths_resolve_against_cwd() {
        let mut config = Config::default();
        config.paths.logs = "logs".to_string();
        let logs = config.logs_path();
        assert!(logs.is_absolute());
        assert!(logs.ends_with("logs"));
    }

    #[test]
    fn test_catalog_defaults_have_production_schemas() {
        let catalog = CatalogConfig::default();
        assert_eq!(catalog.databases.len(), 5);
        assert_eq!(
            catalog.schemas_by_database["Production Database"],
            vec!["Main Schema", "Backup Schema", "Archive Schema"]
        );
        assert_eq!(catalog.versions.first().map(String::as_str), Some("v3.0.0"));
    }

    #[test]
    fn test_load_explicit_toml_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[wizard]\nauth_attempt_cap = 5\n\n[paths]\nstate_file = \"/tmp/x.json\"\nlogs = \"/tmp/logs\"\n",
        )
        .unwrap();

        let config = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.wizard.auth_attempt_cap, 5);
        assert_eq!(config.wizard.issue_page_size, 10);
        assert_eq!(config.state_file_path(), PathBuf::from("/tmp/x.json"));
    }

    #[test]
    fn test_to_toml_contains_sections() {
        let toml = Config::default().to_toml().unwrap();
        assert!(toml.contains("[wizard]"));
        assert!(toml.contains("[catalog]"));
    }
}
