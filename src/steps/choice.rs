//! Picking one option from a list by number, name or search term

use crate::ui::render;
use crate::ui::Notice;
use crate::wizard::{StepContext, StepError};

/// How one line of input resolves against the offered options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Selected(String),
    /// Several options contain the search term
    Ambiguous(Vec<String>),
    NoMatch,
    /// A number outside `1..=options.len()`
    OutOfRange,
    Empty,
    Quit,
}

/// Resolve `input` against `options`.
///
/// A number picks by 1-based position; otherwise an exact name
/// (case-insensitive) wins over a substring search.
pub fn resolve(options: &[String], input: &str) -> Resolution {
    let input = input.trim();
    if input.is_empty() {
        return Resolution::Empty;
    }
    if input.eq_ignore_ascii_case("q") {
        return Resolution::Quit;
    }

    if let Ok(number) = input.parse::<usize>() {
        return match number.checked_sub(1).and_then(|i| options.get(i)) {
            Some(option) => Resolution::Selected(option.clone()),
            None => Resolution::OutOfRange,
        };
    }

    if let Some(exact) = options.iter().find(|o| o.eq_ignore_ascii_case(input)) {
        return Resolution::Selected(exact.clone());
    }

    let needle = input.to_lowercase();
    let mut matches: Vec<String> = options
        .iter()
        .filter(|o| o.to_lowercase().contains(&needle))
        .cloned()
        .collect();

    match matches.len() {
        0 => Resolution::NoMatch,
        1 => Resolution::Selected(matches.remove(0)),
        _ => Resolution::Ambiguous(matches),
    }
}

/// Resolve a value given on the command line; only an unambiguous match counts
pub fn resolve_preset(options: &[String], preset: &str) -> Option<String> {
    match resolve(options, preset) {
        Resolution::Selected(option) => Some(option),
        _ => None,
    }
}

/// Result of an interactive pick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Picked {
    Value(String),
    /// Enter on an optional prompt
    Skipped,
    /// `q`
    Quit,
}

/// Prompt until the user picks one of `options`.
///
/// With `optional`, an empty answer skips. Out-of-range numbers and unknown
/// names are reported and asked again.
pub fn pick(
    ctx: &mut StepContext<'_>,
    title: &str,
    options: &[String],
    optional: bool,
    columns: usize,
) -> Result<Picked, StepError> {
    ctx.show(&render::option_list(title, options, columns));

    let prompt = if optional {
        format!(
            "Enter number (1-{}) or name (Enter to skip, 'q' to quit)",
            options.len()
        )
    } else {
        format!(
            "Enter number (1-{}) or search term ('q' to quit)",
            options.len()
        )
    };

    loop {
        let input = ctx.prompter().input(&prompt, None)?;
        match resolve(options, &input) {
            Resolution::Selected(option) => {
                ctx.notify(Notice::Info, &format!("Selected: {}", option));
                return Ok(Picked::Value(option));
            }
            Resolution::Ambiguous(matches) => {
                if let Some(option) = pick_from_matches(ctx, &matches)? {
                    ctx.notify(Notice::Info, &format!("Selected: {}", option));
                    return Ok(Picked::Value(option));
                }
            }
            Resolution::NoMatch => {
                ctx.notify(Notice::Warning, "No matches found. Try again.");
            }
            Resolution::OutOfRange => {
                ctx.notify(
                    Notice::Error,
                    &format!("Please enter a number between 1 and {}", options.len()),
                );
            }
            Resolution::Empty if optional => return Ok(Picked::Skipped),
            Resolution::Empty => {}
            Resolution::Quit => return Ok(Picked::Quit),
        }
    }
}

/// Sub-menu for a search term that matched several options
fn pick_from_matches(
    ctx: &mut StepContext<'_>,
    matches: &[String],
) -> Result<Option<String>, StepError> {
    ctx.show(&render::option_list("Search results", matches, 1));
    let input = ctx
        .prompter()
        .input(&format!("Select from results (1-{})", matches.len()), None)?;

    match input.trim().parse::<usize>() {
        Ok(n) if (1..=matches.len()).contains(&n) => Ok(Some(matches[n - 1].clone())),
        _ => {
            ctx.notify(Notice::Error, "Invalid selection");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<String> {
        ["Production Database", "Development Database", "Test Database"]
            .iter()
            .map(|s| (*s).to_string())
            .collect()
    }

    #[test]
    fn test_resolve_by_number() {
        assert_eq!(
            resolve(&options(), "2"),
            Resolution::Selected("Development Database".to_string())
        );
        assert_eq!(resolve(&options(), "0"), Resolution::OutOfRange);
        assert_eq!(resolve(&options(), "4"), Resolution::OutOfRange);
    }

    #[test]
    fn test_resolve_by_search_term() {
        assert_eq!(
            resolve(&options(), "prod"),
            Resolution::Selected("Production Database".to_string())
        );
        assert_eq!(
            resolve(&options(), "database"),
            Resolution::Ambiguous(options())
        );
        assert_eq!(resolve(&options(), "oracle"), Resolution::NoMatch);
    }

    #[test]
    fn test_exact_name_beats_substring() {
        let versions: Vec<String> = vec!["v2.4.1".into(), "v2.4.10".into()];
        assert_eq!(
            resolve(&versions, "V2.4.1"),
            Resolution::Selected("v2.4.1".to_string())
        );
    }

    #[test]
    fn test_quit_and_empty() {
        assert_eq!(resolve(&options(), "  "), Resolution::Empty);
        assert_eq!(resolve(&options(), "Q"), Resolution::Quit);
    }

    #[test]
    fn test_resolve_preset_requires_unique_match() {
        assert_eq!(
            resolve_preset(&options(), "test"),
            Some("Test Database".to_string())
        );
        assert_eq!(resolve_preset(&options(), "database"), None);
        assert_eq!(resolve_preset(&options(), "9"), None);
    }
}
