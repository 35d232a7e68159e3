//! Command-line interface.
//!
//! Clap definitions live here; each subcommand group has its own module
//! under [`commands`] with an `execute` entry point.

pub(crate) mod commands;
mod context;
pub(crate) mod id_resolver;
pub(crate) mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::domain::errors::DomainError;
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

pub use context::AppContext;

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(name = "almanac")]
#[command(about = "Almanac - scheduled tasks with repeats, reminders and a calendar", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Read configuration from this file instead of `.almanac/`
    #[arg(short, long, global = true, env = "ALMANAC_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scheduled task management
    Task(commands::task::TaskArgs),

    /// Month and day views
    Calendar(commands::calendar::CalendarArgs),

    /// Mark overdue upcoming tasks as missed
    Sweep,

    /// Run the missed-task sweeper on a timer until interrupted
    Daemon(commands::daemon::DaemonArgs),
}

impl Cli {
    /// Load config from `--config` when given, otherwise from `.almanac/` and the environment.
    pub fn load_config(&self) -> Result<Config> {
        match self.config {
            Some(ref path) => ConfigLoader::load_from_file(path),
            None => ConfigLoader::load(),
        }
    }
}

/// Run `command` against an opened context.
pub async fn dispatch(command: Commands, ctx: &AppContext, json_mode: bool) -> Result<()> {
    match command {
        Commands::Task(args) => commands::task::execute(args, ctx, json_mode).await,
        Commands::Calendar(args) => commands::calendar::execute(args, ctx, json_mode).await,
        Commands::Sweep => commands::sweep::execute(ctx, json_mode).await,
        Commands::Daemon(args) => commands::daemon::execute(args, ctx, json_mode).await,
    }
}

/// Print an error the way the user should see it and exit non-zero.
///
/// Domain errors go through [`DomainError::user_message`] so store failures
/// read as one generic retryable message.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let message = match err.downcast_ref::<DomainError>() {
        Some(domain) => domain.user_message(),
        None => format!("{err:#}"),
    };
    tracing::debug!(error = ?err, "command failed");

    if json_mode {
        let body = serde_json::json!({ "success": false, "error": message });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {message}");
    }
    std::process::exit(1);
}
