//! API error types for remote collaborators

use std::fmt;

/// Errors that can occur when calling remote services
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 401 Unauthorized - credentials rejected or expired
    Unauthorized { provider: String },
    /// 403 Forbidden - credentials lack required permissions
    Forbidden { provider: String },
    /// Credentials were missing or malformed before any request was made
    InvalidCredentials { provider: String, message: String },
    /// 429 Rate Limited
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },
    /// Network or timeout error
    NetworkError { provider: String, message: String },
    /// Other HTTP errors
    HttpError {
        provider: String,
        status: u16,
        message: String,
    },
    /// Provider not configured (no domain or credentials for this run)
    NotConfigured { provider: String },
}

impl ApiError {
    /// Check if this is an authentication error (401, 403, rejected credentials)
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized { .. }
                | ApiError::Forbidden { .. }
                | ApiError::InvalidCredentials { .. }
                | ApiError::NotConfigured { .. }
        )
    }

    /// Check if retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::NetworkError { .. } | ApiError::RateLimited { .. } => true,
            ApiError::HttpError { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Get retry-after seconds if rate limited
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ApiError::RateLimited {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }

    /// Create an unauthorized error for a provider
    pub fn unauthorized(provider: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            provider: provider.into(),
        }
    }

    /// Create a forbidden error for a provider
    pub fn forbidden(provider: impl Into<String>) -> Self {
        ApiError::Forbidden {
            provider: provider.into(),
        }
    }

    /// Create an invalid-credentials error for a provider
    pub fn invalid_credentials(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::InvalidCredentials {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a rate limited error for a provider
    pub fn rate_limited(provider: impl Into<String>, retry_after: Option<u64>) -> Self {
        ApiError::RateLimited {
            provider: provider.into(),
            retry_after_secs: retry_after,
        }
    }

    /// Create a network error for a provider
    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::NetworkError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP error for a provider
    pub fn http(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        ApiError::HttpError {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a not configured error for a provider
    pub fn not_configured(provider: impl Into<String>) -> Self {
        ApiError::NotConfigured {
            provider: provider.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized { provider } => {
                write!(f, "{}: Unauthorized (401) - credentials rejected", provider)
            }
            ApiError::Forbidden { provider } => {
                write!(
                    f,
                    "{}: Forbidden (403) - insufficient permissions",
                    provider
                )
            }
            ApiError::InvalidCredentials { provider, message } => {
                write!(f, "{}: Invalid credentials - {}", provider, message)
            }
            ApiError::RateLimited {
                provider,
                retry_after_secs,
            } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "{}: Rate limited - retry after {}s", provider, secs)
                } else {
                    write!(f, "{}: Rate limited", provider)
                }
            }
            ApiError::NetworkError { provider, message } => {
                write!(f, "{}: Network error - {}", provider, message)
            }
            ApiError::HttpError {
                provider,
                status,
                message,
            } => {
                write!(f, "{}: HTTP {} - {}", provider, status, message)
            }
            ApiError::NotConfigured { provider } => {
                write!(f, "{}: Not configured (no credentials for this run)", provider)
            }
        }
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_auth_error() {
        assert!(ApiError::unauthorized("test").is_auth_error());
        assert!(ApiError::forbidden("test").is_auth_error());
        assert!(ApiError::invalid_credentials("test", "empty password").is_auth_error());
        assert!(!ApiError::rate_limited("test", None).is_auth_error());
        assert!(!ApiError::network("test", "timeout").is_auth_error());
    }

    #[test]
    fn test_is_transient() {
        assert!(ApiError::network("jira", "connection reset").is_transient());
        assert!(ApiError::rate_limited("jira", Some(5)).is_transient());
        assert!(ApiError::http("jira", 503, "unavailable").is_transient());
        assert!(!ApiError::http("jira", 400, "bad jql").is_transient());
        assert!(!ApiError::unauthorized("jira").is_transient());
    }

    #[test]
    fn test_retry_after() {
        assert_eq!(ApiError::rate_limited("jira", Some(60)).retry_after(), Some(60));
        assert_eq!(ApiError::rate_limited("jira", None).retry_after(), None);
        assert_eq!(ApiError::network("jira", "timeout").retry_after(), None);
    }

    #[test]
    fn test_display() {
        let err = ApiError::rate_limited("jira", Some(30));
        assert_eq!(err.to_string(), "jira: Rate limited - retry after 30s");

        let err = ApiError::invalid_credentials("offline", "username and password are required");
        assert_eq!(
            err.to_string(),
            "offline: Invalid credentials - username and password are required"
        );
    }
}
