//! Interactive surface of the wizard
//!
//! Steps and the controller only talk to a [`Prompter`]. The terminal
//! implementation drives dialoguer prompts and an indicatif spinner; the
//! scripted one replays canned answers for tests.

pub mod render;
mod scripted;
mod terminal;

pub use scripted::{Answer, ScriptedPrompter, Transcript};
pub use terminal::TerminalPrompter;

use thiserror::Error;

/// Severity of a one-line message to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("interrupted by user")]
    Interrupted,

    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),

    #[error("no scripted answer left for prompt '{0}'")]
    Exhausted(String),

    #[error("scripted answer for '{prompt}' is not {expected}")]
    Mismatch {
        prompt: String,
        expected: &'static str,
    },
}

/// Everything the wizard asks of the person at the keyboard
pub trait Prompter: Send {
    /// Free text. Empty input is allowed and returned as-is.
    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String, PromptError>;

    /// Hidden text (passwords)
    fn secret(&mut self, prompt: &str) -> Result<String, PromptError>;

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, PromptError>;

    /// Pick one of `items`, returning its index
    fn select(&mut self, prompt: &str, items: &[&str], default: usize)
        -> Result<usize, PromptError>;

    fn notify(&mut self, level: Notice, message: &str);

    /// Print a pre-rendered block (tables, summaries)
    fn show(&mut self, block: &str);

    /// Indicate that a remote call is pending
    fn waiting(&mut self, label: &str);

    fn done_waiting(&mut self);
}
