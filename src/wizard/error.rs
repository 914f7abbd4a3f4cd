//! Step failures and how the controller treats them

use std::fmt;

use thiserror::Error;

use crate::api::ApiError;
use crate::dispatcher::{DispatchError, TaskError};
use crate::store::StoreError;
use crate::ui::PromptError;

/// How a failure is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Remote or background failure; the step may be retried
    Transient,
    /// Bad input; re-prompted where it happened
    Validation,
    /// Credentials rejected; retried up to the step's attempt cap
    Auth,
    /// Unrecoverable; the wizard aborts
    Fatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum StepError {
    #[error("{0}")]
    Remote(#[from] ApiError),

    #[error("{0}")]
    Task(#[from] TaskError),

    #[error("{0}")]
    Invalid(String),

    /// The remote side answered, but with nothing usable
    #[error("{0}")]
    Unavailable(String),

    #[error("could not start background work: {0}")]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("saved progress is unusable: {0}")]
    CorruptSnapshot(String),

    #[error("{0}")]
    Prompt(#[from] PromptError),
}

impl StepError {
    pub fn invalid(message: impl Into<String>) -> Self {
        StepError::Invalid(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StepError::Remote(err) => api_kind(err),
            StepError::Task(err) => task_kind(err),
            StepError::Invalid(_) => ErrorKind::Validation,
            StepError::Unavailable(_) => ErrorKind::Transient,
            StepError::Dispatch(_) => ErrorKind::Fatal,
            StepError::Store(_) | StepError::CorruptSnapshot(_) => ErrorKind::Fatal,
            StepError::Prompt(_) => ErrorKind::Fatal,
        }
    }

    /// The user pressed Ctrl-C at a prompt
    pub fn is_interrupt(&self) -> bool {
        matches!(self, StepError::Prompt(PromptError::Interrupted))
    }
}

fn api_kind(err: &ApiError) -> ErrorKind {
    if err.is_auth_error() {
        ErrorKind::Auth
    } else {
        ErrorKind::Transient
    }
}

fn task_kind(err: &TaskError) -> ErrorKind {
    match err {
        TaskError::Failed(inner) => {
            if let Some(api) = inner.downcast_ref::<ApiError>() {
                api_kind(api)
            } else if inner.downcast_ref::<StoreError>().is_some() {
                ErrorKind::Fatal
            } else {
                ErrorKind::Transient
            }
        }
        TaskError::Panicked(_) | TaskError::Discarded => ErrorKind::Transient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_api_errors_classify_by_status() {
        assert_eq!(
            StepError::from(ApiError::unauthorized("jira")).kind(),
            ErrorKind::Auth
        );
        assert_eq!(
            StepError::from(ApiError::forbidden("jira")).kind(),
            ErrorKind::Auth
        );
        assert_eq!(
            StepError::from(ApiError::invalid_credentials("offline", "empty")).kind(),
            ErrorKind::Auth
        );
        assert_eq!(
            StepError::from(ApiError::http("jira", 500, "oops")).kind(),
            ErrorKind::Transient
        );
    }

    #[test]
    fn test_task_errors_look_through_anyhow() {
        let auth = TaskError::Failed(anyhow::Error::new(ApiError::unauthorized("jira")));
        assert_eq!(StepError::from(auth).kind(), ErrorKind::Auth);

        let store = TaskError::Failed(anyhow::Error::new(StoreError::NotAnObject {
            path: PathBuf::from("state.json"),
        }));
        assert_eq!(StepError::from(store).kind(), ErrorKind::Fatal);

        let other = TaskError::Failed(anyhow::anyhow!("socket closed"));
        assert_eq!(StepError::from(other).kind(), ErrorKind::Transient);

        assert_eq!(
            StepError::from(TaskError::Panicked("attempt to divide by zero".into())).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            StepError::from(TaskError::Discarded).kind(),
            ErrorKind::Transient
        );
    }

    #[test]
    fn test_local_errors() {
        assert_eq!(
            StepError::invalid("Please enter a number between 1 and 5").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            StepError::CorruptSnapshot("missing result".into()).kind(),
            ErrorKind::Fatal
        );
        assert_eq!(
            StepError::Unavailable("No issues found".into()).kind(),
            ErrorKind::Transient
        );
        assert!(StepError::from(PromptError::Interrupted).is_interrupt());
        assert!(!StepError::from(DispatchError::Closed).is_interrupt());
    }
}
