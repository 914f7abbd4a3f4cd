//! Tracing setup.
//!
//! The interactive wizard owns the terminal, so it logs to
//! `<logs>/tm-setter-{datetime}.log`. One-shot commands log to stderr.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Keeps the file writer alive; dropping it flushes buffered lines
pub struct LoggingHandle {
    pub _guard: Option<WorkerGuard>,
    pub log_file_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    File { dir: PathBuf, name: String },
    Stderr,
}

fn log_target(config: &Config, interactive: bool) -> LogTarget {
    if interactive && config.logging.to_file {
        let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
        LogTarget::File {
            dir: config.logs_path(),
            name: format!("tm-setter-{timestamp}.log"),
        }
    } else {
        LogTarget::Stderr
    }
}

/// `RUST_LOG` wins over `--verbose`, which wins over `logging.level`
fn filter_directive(config: &Config, verbose: bool, rust_log: Option<String>) -> String {
    rust_log.unwrap_or_else(|| {
        if verbose {
            "debug".to_string()
        } else {
            config.logging.level.clone()
        }
    })
}

pub fn init_logging(config: &Config, interactive: bool, verbose: bool) -> Result<LoggingHandle> {
    let filter = EnvFilter::new(filter_directive(
        config,
        verbose,
        std::env::var("RUST_LOG").ok(),
    ));

    match log_target(config, interactive) {
        LogTarget::File { dir, name } => {
            std::fs::create_dir_all(&dir)?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, &name));

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_names(true)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();

            Ok(LoggingHandle {
                _guard: Some(guard),
                log_file_path: Some(dir.join(name)),
            })
        }
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .init();

            Ok(LoggingHandle {
                _guard: None,
                log_file_path: None,
            })
        }
    }
}

/// Whether a log file was actually written to
pub fn has_entries(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.logs = dir.path().join("logs").to_string_lossy().to_string();
        config
    }

    #[test]
    fn test_interactive_logs_to_file_under_logs_dir() {
        let dir = TempDir::new().unwrap();
        match log_target(&config_in(&dir), true) {
            LogTarget::File { dir: logs, name } => {
                assert!(logs.starts_with(dir.path()));
                assert!(name.starts_with("tm-setter-"));
                assert!(name.ends_with("Z.log"));
            }
            LogTarget::Stderr => panic!("interactive run should log to a file"),
        }
    }

    #[test]
    fn test_one_shot_and_disabled_file_log_to_stderr() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        assert_eq!(log_target(&config, false), LogTarget::Stderr);

        config.logging.to_file = false;
        assert_eq!(log_target(&config, true), LogTarget::Stderr);
    }

    #[test]
    fn test_filter_precedence() {
        let mut config = Config::default();
        config.logging.level = "warn".to_string();

        assert_eq!(filter_directive(&config, false, None), "warn");
        assert_eq!(filter_directive(&config, true, None), "debug");
        assert_eq!(
            filter_directive(&config, true, Some("tm_setter=trace".to_string())),
            "tm_setter=trace"
        );
    }

    #[test]
    fn test_has_entries() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.log");
        std::fs::write(&empty, "").unwrap();
        assert!(!has_entries(&empty));

        let full = dir.path().join("full.log");
        std::fs::write(&full, "INFO started\n").unwrap();
        assert!(has_entries(&full));

        assert!(!has_entries(&dir.path().join("missing.log")));
    }
}
