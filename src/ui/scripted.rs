//! Non-interactive [`Prompter`] that replays a fixed script of answers

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use super::{Notice, PromptError, Prompter};

/// One canned reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Reply to `input` or `secret`
    Text(String),
    /// Reply to `confirm`
    Confirm(bool),
    /// Reply to `select` by index
    Choose(usize),
    /// Reply to `select` by item label (case-insensitive prefix)
    Pick(String),
    /// Fail the next prompt as if the user pressed Ctrl-C
    Interrupt,
}

/// Everything a scripted run printed or asked, in order
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Transcript {
    fn push(&self, line: String) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    /// Number of lines containing `needle`
    pub fn count(&self, needle: &str) -> usize {
        self.lines()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }
}

#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<Answer>,
    transcript: Transcript,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, value: &str) -> Self {
        self.answers.push_back(Answer::Text(value.to_string()));
        self
    }

    pub fn yes_no(mut self, value: bool) -> Self {
        self.answers.push_back(Answer::Confirm(value));
        self
    }

    pub fn choose(mut self, index: usize) -> Self {
        self.answers.push_back(Answer::Choose(index));
        self
    }

    pub fn pick(mut self, label: &str) -> Self {
        self.answers.push_back(Answer::Pick(label.to_string()));
        self
    }

    pub fn interrupt(mut self) -> Self {
        self.answers.push_back(Answer::Interrupt);
        self
    }

    /// Handle on the output, usable after the prompter has been moved
    pub fn transcript(&self) -> Transcript {
        self.transcript.clone()
    }

    /// Answers not yet consumed
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, prompt: &str) -> Result<Answer, PromptError> {
        self.transcript.push(format!("? {}", prompt));
        match self.answers.pop_front() {
            Some(Answer::Interrupt) => Err(PromptError::Interrupted),
            Some(answer) => Ok(answer),
            None => Err(PromptError::Exhausted(prompt.to_string())),
        }
    }

    fn mismatch(prompt: &str, expected: &'static str) -> PromptError {
        PromptError::Mismatch {
            prompt: prompt.to_string(),
            expected,
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String, PromptError> {
        match self.next(prompt)? {
            Answer::Text(text) if text.is_empty() => {
                Ok(default.map(str::to_string).unwrap_or_default())
            }
            Answer::Text(text) => Ok(text),
            _ => Err(Self::mismatch(prompt, "text")),
        }
    }

    fn secret(&mut self, prompt: &str) -> Result<String, PromptError> {
        match self.next(prompt)? {
            Answer::Text(text) => Ok(text),
            _ => Err(Self::mismatch(prompt, "text")),
        }
    }

    fn confirm(&mut self, prompt: &str, _default: bool) -> Result<bool, PromptError> {
        match self.next(prompt)? {
            Answer::Confirm(value) => Ok(value),
            _ => Err(Self::mismatch(prompt, "a yes/no answer")),
        }
    }

    fn select(
        &mut self,
        prompt: &str,
        items: &[&str],
        _default: usize,
    ) -> Result<usize, PromptError> {
        match self.next(prompt)? {
            Answer::Choose(index) if index < items.len() => Ok(index),
            Answer::Pick(label) => {
                let label = label.to_lowercase();
                items
                    .iter()
                    .position(|item| item.to_lowercase().starts_with(&label))
                    .ok_or_else(|| Self::mismatch(prompt, "one of the offered items"))
            }
            _ => Err(Self::mismatch(prompt, "one of the offered items")),
        }
    }

    fn notify(&mut self, level: Notice, message: &str) {
        let tag = match level {
            Notice::Info => "info",
            Notice::Success => "ok",
            Notice::Warning => "warn",
            Notice::Error => "error",
        };
        self.transcript.push(format!("[{}] {}", tag, message));
    }

    fn show(&mut self, block: &str) {
        for line in block.lines() {
            self.transcript.push(line.to_string());
        }
    }

    fn waiting(&mut self, label: &str) {
        self.transcript.push(format!("... {}", label));
    }

    fn done_waiting(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answers_replay_in_order() {
        let mut prompter = ScriptedPrompter::new()
            .text("john.doe")
            .yes_no(true)
            .pick("back");
        let transcript = prompter.transcript();

        assert_eq!(prompter.input("Username", None).unwrap(), "john.doe");
        assert!(prompter.confirm("Continue?", false).unwrap());
        assert_eq!(
            prompter
                .select("What next?", &["Retry", "Back", "Quit"], 0)
                .unwrap(),
            1
        );
        assert_eq!(prompter.remaining(), 0);
        assert!(transcript.contains("? Continue?"));
    }

    #[test]
    fn test_empty_text_takes_default() {
        let mut prompter = ScriptedPrompter::new().text("");
        assert_eq!(prompter.input("Username", Some("saved")).unwrap(), "saved");
    }

    #[test]
    fn test_exhausted_and_mismatched_answers() {
        let mut prompter = ScriptedPrompter::new().yes_no(true);
        assert!(matches!(
            prompter.input("Username", None),
            Err(PromptError::Mismatch { .. })
        ));
        assert!(matches!(
            prompter.confirm("Again?", true),
            Err(PromptError::Exhausted(_))
        ));
    }

    #[test]
    fn test_interrupt_answer() {
        let mut prompter = ScriptedPrompter::new().interrupt();
        assert!(matches!(
            prompter.secret("Password"),
            Err(PromptError::Interrupted)
        ));
    }
}
