//! dialoguer/indicatif implementation of [`Prompter`]

use std::io;
use std::time::Duration;

use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};

use super::{Notice, PromptError, Prompter};

pub struct TerminalPrompter {
    theme: ColorfulTheme,
    spinner: Option<ProgressBar>,
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
            spinner: None,
        }
    }
}

/// Ctrl-C inside a raw-mode prompt surfaces as an `Interrupted` read error
fn prompt_error(err: dialoguer::Error) -> PromptError {
    let dialoguer::Error::IO(err) = err;
    if err.kind() == io::ErrorKind::Interrupted {
        // dialoguer leaves the cursor hidden when a select is interrupted
        let _ = console::Term::stderr().show_cursor();
        PromptError::Interrupted
    } else {
        PromptError::Terminal(err)
    }
}

impl Prompter for TerminalPrompter {
    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String, PromptError> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        input.interact_text().map_err(prompt_error)
    }

    fn secret(&mut self, prompt: &str) -> Result<String, PromptError> {
        Password::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(prompt_error)
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, PromptError> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(prompt_error)
    }

    fn select(
        &mut self,
        prompt: &str,
        items: &[&str],
        default: usize,
    ) -> Result<usize, PromptError> {
        Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default.min(items.len().saturating_sub(1)))
            .interact()
            .map_err(prompt_error)
    }

    fn notify(&mut self, level: Notice, message: &str) {
        match level {
            Notice::Info => println!("{} {}", "ℹ".blue(), message),
            Notice::Success => println!("{} {}", "✓".green(), message),
            Notice::Warning => println!("{} {}", "⚠".yellow(), message),
            Notice::Error => eprintln!("{} {}", "✗".red(), message),
        }
    }

    fn show(&mut self, block: &str) {
        println!("{}", block);
    }

    fn waiting(&mut self, label: &str) {
        self.done_waiting();

        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(label.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn done_waiting(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}
