//! Command-line entry point for the maintenance scheduler.
//!
//! # Responsibility
//! - Open a SQLite store, load config, start logging.
//! - Trigger one scheduler run per invocation and print the result as JSON.
//!
//! Account resolution is the caller's job: the account id is always explicit.

use clap::{Parser, Subcommand};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use upkeep_core::{
    core_version, init_logging, resolve_lookahead, CatalogRepository, SchedulerConfig,
    SchedulerService, SqliteMaintenanceStore, TaskStatus,
};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "upkeep", about = "Schedule maintenance tasks for an account")]
struct Cli {
    /// JSON config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Absolute directory for rolling log files.
    #[arg(long, global = true)]
    log_dir: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Materialize due maintenance tasks for one account.
    Run {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        account: Uuid,
        /// Lookahead in months. Invalid values fall back to the default.
        #[arg(long)]
        months: Option<String>,
        /// Lookahead in days, converted to months when `--months` is absent.
        #[arg(long)]
        days: Option<String>,
    },
    /// List tasks of one account.
    Tasks {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        account: Uuid,
        /// `pending|completed|dismissed`.
        #[arg(long)]
        status: Option<String>,
    },
    /// Print the core version.
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_exit module=cli status=error error={message}");
            eprintln!("upkeep: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let config = match cli.config.as_ref() {
        Some(path) => SchedulerConfig::load(path).map_err(|err| err.to_string())?,
        None => SchedulerConfig::default(),
    };
    if let Some(log_dir) = cli.log_dir.as_deref() {
        init_logging(&config.log_level, log_dir).map_err(|err| err.to_string())?;
    }

    match cli.command {
        Command::Run {
            db,
            account,
            months,
            days,
        } => {
            let store = SqliteMaintenanceStore::open(&db).map_err(|err| err.to_string())?;
            let lookahead = resolve_lookahead(
                months.as_deref(),
                days.as_deref(),
                config.default_lookahead(),
            );
            let service = SchedulerService::new(store).with_config(config);
            let result = service
                .run_scheduler(account, Some(lookahead.get()))
                .map_err(|err| err.to_string())?;
            print_json(&result)
        }
        Command::Tasks {
            db,
            account,
            status,
        } => {
            let status = match status.as_deref() {
                Some(raw) => Some(
                    TaskStatus::parse(raw).ok_or_else(|| format!("unknown task status `{raw}`"))?,
                ),
                None => None,
            };
            let store = SqliteMaintenanceStore::open(&db).map_err(|err| err.to_string())?;
            let tasks = store
                .list_tasks(account, status)
                .map_err(|err| err.to_string())?;
            print_json(&tasks)
        }
        Command::Version => {
            println!("upkeep_core version={}", core_version());
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{rendered}");
    Ok(())
}
