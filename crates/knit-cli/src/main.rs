//! Knit CLI
//!
//! Command-line interface for knitting project counters.

mod display;
mod prompt;
mod viewer;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use display::{render_entries, render_outcome, render_project};
use knit_core::counter::parse_delta;
use knit_core::lifecycle::prompt_counters;
use knit_core::project::absolute_path;
use knit_core::{
    ConfigStore, CounterSpec, InputProvider, KnitError, LockFile, ProjectManager, ProjectSetup,
};
use prompt::TerminalInput;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the state directory
const HOME_ENV: &str = "KNIT_HOME";

#[derive(Parser)]
#[command(name = "knit")]
#[command(about = "Row and repeat counters for knitting projects")]
#[command(version)]
struct Cli {
    /// State directory (default: $KNIT_HOME, then the user config dir)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Do not take the state lock file
    #[arg(long, global = true)]
    no_lock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project
    Setup {
        /// Project name, also the document's file name
        name: String,

        /// Directory for the project document (default: projects dir)
        #[arg(long)]
        path: Option<PathBuf>,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Counter as NAME or NAME:ROLLOVER; asked interactively when omitted
        #[arg(short, long = "counter")]
        counters: Vec<CounterSpec>,

        /// Default counter (default: the first counter)
        #[arg(long)]
        default: Option<String>,

        /// Keep the current project current
        #[arg(long)]
        no_activate: bool,
    },

    /// Increment a counter of the current project
    ///
    /// A single whole-number argument is the amount for the default
    /// counter, which is why counter names cannot be numbers.
    #[command(allow_negative_numbers = true)]
    Inc {
        /// Counter name, or the amount when it is a whole number
        target: Option<String>,
        /// Amount to add (default: 1)
        amount: Option<String>,
    },

    /// Decrement a counter of the current project
    #[command(allow_negative_numbers = true)]
    Dec {
        /// Counter name, or the amount when it is a whole number
        target: Option<String>,
        /// Amount to subtract (default: 1)
        amount: Option<String>,
    },

    /// Switch the current project
    Project {
        /// Document path or project name
        identifier: String,
    },

    /// Switch the current project's default counter
    Default { counter: String },

    /// Register an existing project document
    Add { path: PathBuf },

    /// List registered projects
    List,

    /// Show a project's counters
    Show {
        /// Document path or project name (default: current project)
        identifier: Option<String>,
    },

    /// Live view of a project's counters
    Watch {
        /// Document path or project name (default: current project)
        identifier: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let state_dir = resolve_state_dir(cli.home)?;
    let mut manager = ProjectManager::new(&state_dir);
    if !cli.no_lock {
        manager = manager.with_lock(LockFile::in_dir(&state_dir));
    }
    manager
        .bootstrap()
        .with_context(|| format!("Failed to initialize {}", state_dir.display()))?;

    match cli.command {
        Commands::Setup {
            name,
            path,
            description,
            counters,
            default,
            no_activate,
        } => {
            let mut setup = ProjectSetup::new(name)
                .description(description)
                .make_active(!no_activate);
            setup.directory = path;
            setup.counters = counters;
            setup.default_counter = default;
            cmd_setup(&manager, setup)
        }
        Commands::Inc { target, amount } => cmd_increment(&manager, target, amount, false),
        Commands::Dec { target, amount } => cmd_increment(&manager, target, amount, true),
        Commands::Project { identifier } => cmd_project(&manager, &identifier),
        Commands::Default { counter } => cmd_default(&manager, &counter),
        Commands::Add { path } => cmd_add(&manager, path),
        Commands::List => cmd_list(&manager),
        Commands::Show { identifier } => cmd_show(&manager, identifier.as_deref()),
        Commands::Watch { identifier } => viewer::run(&manager, identifier.as_deref()).await,
    }
}

/// Log to stderr so stdout stays clean for command output
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// `--home`, then `$KNIT_HOME`, then the platform default; always absolute
/// so stored project paths do not depend on the working directory.
fn resolve_state_dir(home: Option<PathBuf>) -> Result<PathBuf> {
    let dir = home
        .or_else(|| {
            std::env::var_os(HOME_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(ConfigStore::default_state_dir);
    absolute_path(&dir).context("Failed to resolve the state directory")
}

/// Split `inc`/`dec` arguments into counter and amount. A lone argument
/// that reads as a whole number is the amount for the default counter.
fn split_increment_args(
    target: Option<String>,
    amount: Option<String>,
) -> (Option<String>, String) {
    match (target, amount) {
        (None, _) => (None, "1".to_string()),
        (Some(target), None) if parse_delta(&target).is_ok() => (None, target),
        (Some(target), amount) => (Some(target), amount.unwrap_or_else(|| "1".to_string())),
    }
}

fn increment_delta(amount: &str, decrement: bool) -> Result<i64, KnitError> {
    let delta = parse_delta(amount)?;
    if decrement {
        delta
            .checked_neg()
            .ok_or_else(|| KnitError::InvalidDelta(amount.to_string()))
    } else {
        Ok(delta)
    }
}

fn cmd_setup(manager: &ProjectManager, mut setup: ProjectSetup) -> Result<()> {
    let mut input = TerminalInput::stdin();
    if setup.counters.is_empty() {
        prompt_counters(&mut setup, &mut input).context("Failed to read counters")?;
    }

    let file = manager
        .create_project(&setup, &mut input)
        .with_context(|| format!("Failed to create project '{}'", setup.name))?;
    println!("✓ Created {}", file.path().display());

    let current = manager.config()?.current_project;
    if current.as_deref() == Some(file.path()) {
        println!("✓ {} is now the current project", file.project.name);
    }
    Ok(())
}

fn cmd_increment(
    manager: &ProjectManager,
    target: Option<String>,
    amount: Option<String>,
    decrement: bool,
) -> Result<()> {
    let (counter, amount) = split_increment_args(target, amount);
    let delta = increment_delta(&amount, decrement)?;

    let outcome = match manager.increment(counter.as_deref(), delta) {
        Err(KnitError::NoCurrentProject) if std::io::stdin().is_terminal() => {
            eprintln!("No project yet, let's set one up.");
            first_project(manager)?;
            manager.increment(counter.as_deref(), delta)?
        }
        Err(KnitError::NoCurrentProject) => {
            anyhow::bail!("No current project. Create one with: knit setup <name>")
        }
        result => result.context("Failed to update counter")?,
    };

    println!("{}", render_outcome(&outcome));
    Ok(())
}

/// Interactive setup of the first project
fn first_project(manager: &ProjectManager) -> Result<()> {
    let mut input = TerminalInput::stdin();
    let name = input.ask_text("Project name")?;
    let description = input.ask_text("Description (optional)")?;

    let mut setup = ProjectSetup::new(name.trim()).description(description.trim());
    prompt_counters(&mut setup, &mut input)?;

    let file = manager.create_project(&setup, &mut input)?;
    println!("✓ Created {}", file.path().display());
    Ok(())
}

fn cmd_project(manager: &ProjectManager, identifier: &str) -> Result<()> {
    let file = manager.switch_project(identifier)?;
    println!("✓ Switched to {}", file.project.name);
    Ok(())
}

fn cmd_default(manager: &ProjectManager, counter: &str) -> Result<()> {
    let file = manager.switch_default_counter(counter)?;
    println!(
        "✓ Default counter of {} is now {}",
        file.project.name, file.project.default
    );
    Ok(())
}

fn cmd_add(manager: &ProjectManager, path: PathBuf) -> Result<()> {
    let file = manager
        .register_project(&path)
        .with_context(|| format!("Failed to register {}", path.display()))?;
    println!("✓ Registered {}", file.project.name);
    Ok(())
}

fn cmd_list(manager: &ProjectManager) -> Result<()> {
    print!("{}", render_entries(&manager.list_projects()?));
    Ok(())
}

fn cmd_show(manager: &ProjectManager, identifier: Option<&str>) -> Result<()> {
    let file = match identifier {
        Some(identifier) => manager.load_project(identifier)?,
        None => manager.current_project()?,
    };
    print!("{}", render_project(&file.project));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(target: Option<&str>, amount: Option<&str>) -> (Option<String>, String) {
        split_increment_args(target.map(String::from), amount.map(String::from))
    }

    #[test]
    fn test_split_increment_args() {
        assert_eq!(split(None, None), (None, "1".to_string()));
        assert_eq!(split(Some("3"), None), (None, "3".to_string()));
        assert_eq!(split(Some("-2"), None), (None, "-2".to_string()));
        assert_eq!(split(Some("row"), None), (Some("row".to_string()), "1".to_string()));
        assert_eq!(
            split(Some("repeat"), Some("4")),
            (Some("repeat".to_string()), "4".to_string())
        );
    }

    #[test]
    fn test_increment_delta() {
        assert_eq!(increment_delta("2", false).unwrap(), 2);
        assert_eq!(increment_delta("2", true).unwrap(), -2);
        assert!(matches!(
            increment_delta("two", false),
            Err(KnitError::InvalidDelta(_))
        ));
        assert!(matches!(
            increment_delta(&i64::MIN.to_string(), true),
            Err(KnitError::InvalidDelta(_))
        ));
    }

    #[test]
    fn test_cli_parses_negative_amount() {
        let cli = Cli::try_parse_from(["knit", "inc", "row", "-3"]).unwrap();
        match cli.command {
            Commands::Inc { target, amount } => {
                assert_eq!(target.as_deref(), Some("row"));
                assert_eq!(amount.as_deref(), Some("-3"));
            }
            _ => panic!("expected inc"),
        }
    }

    #[test]
    fn test_cli_parses_counter_specs() {
        let cli = Cli::try_parse_from([
            "knit", "setup", "scarf", "-c", "row", "-c", "repeat:4", "--default", "row",
        ])
        .unwrap();
        match cli.command {
            Commands::Setup {
                counters, default, ..
            } => {
                assert_eq!(
                    counters,
                    vec![CounterSpec::new("row", None), CounterSpec::new("repeat", Some(4))]
                );
                assert_eq!(default.as_deref(), Some("row"));
            }
            _ => panic!("expected setup"),
        }
    }

    #[test]
    fn test_home_flag_wins() {
        assert_eq!(
            resolve_state_dir(Some(PathBuf::from("/tmp/knit-home"))).unwrap(),
            PathBuf::from("/tmp/knit-home")
        );
    }

    #[test]
    fn test_relative_home_is_made_absolute() {
        let dir = resolve_state_dir(Some(PathBuf::from("knit-home"))).unwrap();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("knit-home"));
    }
}
