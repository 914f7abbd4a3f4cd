use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use tm_setter::api::RemoteClients;
use tm_setter::config::Config;
use tm_setter::dispatcher::TaskDispatcher;
use tm_setter::logging;
use tm_setter::steps::{wizard_steps, ConfigureStep, LoginStep, SelectDbStep, SelectIssueStep};
use tm_setter::store::PersistentStore;
use tm_setter::ui::{render, Prompter, TerminalPrompter};
use tm_setter::wizard::{
    AbortReason, RunOutcome, Step, StepController, Summary, LAST_STATE_KEY, SESSION_KEY,
};

const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "tm-setter")]
#[command(about = "Interactive setup wizard for test-management runs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// State file path (overrides paths.state_file)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full wizard (default)
    Interactive {
        /// Continue from the last saved step
        #[arg(long)]
        resume: bool,
    },

    /// Log in and store a session
    Login {
        /// Username (prompted for when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Remember the username for the next login
        #[arg(long)]
        save: bool,
    },

    /// Select the three-level DB code
    SelectDb {
        /// Database (number, name or search term)
        #[arg(long)]
        db1: Option<String>,

        /// Schema
        #[arg(long)]
        db2: Option<String>,

        /// Table
        #[arg(long)]
        db3: Option<String>,
    },

    /// Select a Jira issue
    SelectIssue {
        /// Issue key to select directly (e.g. PROJ-123)
        #[arg(long)]
        issue: Option<String>,

        /// Initial search text
        #[arg(long)]
        filter: Option<String>,

        /// Issues per page
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Choose repository and binary version
    Configure {
        /// Repository (number, name or search term)
        #[arg(long)]
        repo: Option<String>,

        /// Binary SW version
        #[arg(long)]
        version: Option<String>,

        /// Keep the given values without prompting
        #[arg(long)]
        skip: bool,
    },

    /// Clear the stored session
    Logout,

    /// Print the effective settings as TOML
    ShowConfig,
}

/// Steps to run for a wizard command, and how
struct Plan {
    steps: Vec<Box<dyn Step>>,
    resume: bool,
    single: bool,
}

impl Plan {
    fn for_command(command: Commands) -> Option<Self> {
        let single = |step: Box<dyn Step>| Plan {
            steps: vec![step],
            resume: false,
            single: true,
        };

        let plan = match command {
            Commands::Interactive { resume } => Plan {
                steps: wizard_steps(),
                resume,
                single: false,
            },
            Commands::Login { id, save } => {
                let mut step = LoginStep::new().save_username(save);
                if let Some(id) = id {
                    step = step.with_username(id);
                }
                single(Box::new(step))
            }
            Commands::SelectDb { db1, db2, db3 } => {
                single(Box::new(SelectDbStep::with_presets(db1, db2, db3)))
            }
            Commands::SelectIssue {
                issue,
                filter,
                limit,
            } => single(Box::new(
                SelectIssueStep::new()
                    .with_issue(issue)
                    .with_filter(filter)
                    .with_page_size(limit),
            )),
            Commands::Configure {
                repo,
                version,
                skip,
            } => single(Box::new(
                ConfigureStep::with_presets(repo, version).skip_prompts(skip),
            )),
            Commands::Logout | Commands::ShowConfig => return None,
        };
        Some(plan)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "✗".red(), err);
            1
        }
    };

    if code == EXIT_INTERRUPTED {
        // A prompt may still hold the blocking thread; don't wait on it
        std::process::exit(i32::from(code));
    }
    ExitCode::from(code)
}

async fn run(cli: Cli) -> Result<u8> {
    // Load configuration first (needed for logging setup)
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(state) = &cli.state {
        config.paths.state_file = state.to_string_lossy().into_owned();
    }

    let command = cli
        .command
        .unwrap_or(Commands::Interactive { resume: false });

    // The full wizard owns the terminal, so its logs go to a file
    let interactive = matches!(command, Commands::Interactive { .. });
    let logging_handle = logging::init_logging(&config, interactive, cli.verbose)?;

    let code = match command {
        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
            0
        }
        Commands::Logout => cmd_logout(&config)?,
        command => match Plan::for_command(command) {
            Some(plan) => run_plan(config, plan).await?,
            None => 0,
        },
    };

    // Print log file path on exit if logs were written
    if let Some(log_path) = &logging_handle.log_file_path {
        if logging::has_entries(log_path) {
            eprintln!("Session log: {}", log_path.display());
        }
    }

    drop(logging_handle);
    Ok(code)
}

/// Run the wizard on a blocking thread, racing it against Ctrl-C
async fn run_plan(config: Config, plan: Plan) -> Result<u8> {
    let wizard = tokio::task::spawn_blocking(move || run_wizard(&config, plan));

    tokio::select! {
        joined = wizard => joined.context("Wizard thread panicked")?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            let _ = console::Term::stderr().show_cursor();
            eprintln!("\n{} Interrupted", "⚠".yellow());
            tracing::warn!("Interrupted by Ctrl-C");
            Ok(EXIT_INTERRUPTED)
        }
    }
}

/// Blocking clients are created and dropped on this thread only
fn run_wizard(config: &Config, plan: Plan) -> Result<u8> {
    let store = PersistentStore::open(config.state_file_path())
        .context("Failed to open state file")?;
    let clients = RemoteClients::from_config(config).context("Failed to set up remote clients")?;
    let dispatcher = TaskDispatcher::new(config.wizard.worker_poll_interval())
        .context("Failed to start task dispatcher")?;

    let mut prompter = TerminalPrompter::new();
    if plan.resume && store.contains(LAST_STATE_KEY) {
        prompter.show("Resuming previous session");
        prompter.show(&render::summary(&Summary::from_store(&store)));
    }

    let mut controller = StepController::new(
        plan.steps,
        store,
        dispatcher,
        clients,
        Box::new(prompter),
        config.wizard.clone(),
    );
    if plan.single {
        controller = controller.single();
    }

    if let Err(err) = controller.start(plan.resume) {
        eprintln!("{} {}", "✗".red(), err);
        eprintln!("Run 'tm-setter interactive' to start over.");
        controller.shutdown();
        return Ok(1);
    }

    let outcome = controller.run();
    controller.shutdown();

    match &outcome {
        RunOutcome::Completed => {}
        RunOutcome::Aborted(AbortReason::UserQuit) if !plan.single => {
            println!(
                "{} Progress saved. Continue with 'tm-setter interactive --resume'.",
                "ℹ".blue()
            );
        }
        RunOutcome::Aborted(AbortReason::AttemptCapReached { step }) => {
            eprintln!("{} Giving up on '{}'", "✗".red(), step);
        }
        RunOutcome::Aborted(_) => {}
    }

    Ok(outcome.exit_code())
}

fn cmd_logout(config: &Config) -> Result<u8> {
    let mut store = PersistentStore::open(config.state_file_path())
        .context("Failed to open state file")?;

    if store.remove(SESSION_KEY).is_some() {
        store.save().context("Failed to save state file")?;
        println!("{} Logged out", "✓".green());
    } else {
        println!("Not logged in");
    }
    Ok(0)
}
