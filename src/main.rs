//! fieldplan: farm task planning and deduplication service.
//!
//! Subcommands:
//! - `serve`: run the HTTP API with the candidate queue worker
//! - `field`: register or update a field from a JSON file
//! - `schedule`: schedule one candidate or an array of them
//! - `plan`: run a planning run for a field
//! - `agenda`: print the pruned daily agenda for a window
//! - `progress`: mark one task day done or skipped
//! - `completion`: print the completion rate for a window

mod api;
mod calendar;
mod commands;
mod planning;
mod queue;
mod scheduler;
mod tracker;

#[cfg(test)]
mod test_support;

use calendar::WindowQuery;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use fieldplan_core::config::{self, shellexpand, LogConfig, DEFAULT_CONFIG_PATH};
use planning::PlanRun;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "fieldplan",
    version,
    about = "Farm task planning with near-duplicate suppression and progress tracking"
)]
struct Cli {
    /// Config file path.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API until ctrl-c.
    Serve,
    /// Register or update a field from a JSON file.
    Field {
        #[arg(long)]
        file: PathBuf,
    },
    /// Schedule the candidate (or array of candidates) in a JSON file.
    Schedule {
        /// Owner of the new tasks (defaults to the field's owner).
        #[arg(long)]
        owner: Option<i64>,
        #[arg(long)]
        field: i64,
        #[arg(long)]
        file: PathBuf,
    },
    /// Run a planning run: keywords, daily, biweekly, monthly or advice.
    Plan {
        #[arg(long)]
        field: i64,
        #[arg(long)]
        run: PlanRun,
        /// Planning date (defaults to today in the configured offset).
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        owner: Option<i64>,
        /// Request text for advice runs.
        #[arg(long)]
        message: Option<String>,
        /// Pest summary for daily runs.
        #[arg(long)]
        pest: Option<String>,
        /// Weather summary for daily runs.
        #[arg(long)]
        weather: Option<String>,
    },
    /// Print the daily agenda for a window.
    Agenda {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Mark one day of a task done or skip.
    Progress {
        #[arg(long)]
        task: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// done or skip
        #[arg(long)]
        status: String,
    },
    /// Print the completion rate for a window.
    Completion {
        #[command(flatten)]
        window: WindowArgs,
    },
}

/// `--from [--to]` or `--year --month`.
#[derive(Args)]
struct WindowArgs {
    #[arg(long)]
    owner: i64,
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to: Option<NaiveDate>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    month: Option<u32>,
    #[arg(long)]
    field: Option<i64>,
}

impl From<WindowArgs> for WindowQuery {
    fn from(args: WindowArgs) -> Self {
        Self {
            owner: args.owner,
            from: args.from,
            to: args.to,
            year: args.year,
            month: args.month,
            field: args.field,
        }
    }
}

/// Stderr logging, plus a daily rolling file when `log.dir` is set. The
/// returned guard flushes the file writer on drop.
fn init_tracing(log: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let stderr = fmt::layer().with_writer(std::io::stderr);

    if log.dir.is_empty() {
        tracing_subscriber::registry().with(filter).with(stderr).init();
        return Ok(None);
    }

    let dir = shellexpand(&log.dir);
    std::fs::create_dir_all(&dir)?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, "fieldplan.log"));
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(&cli.config)?;
    let _guard = init_tracing(&config.log)?;

    match cli.command {
        Commands::Serve => commands::handle_serve(config).await,
        Commands::Field { file } => commands::handle_field(&config, &file).await,
        Commands::Schedule { owner, field, file } => {
            commands::handle_schedule(&config, owner, field, &file).await
        }
        Commands::Plan {
            field,
            run,
            date,
            owner,
            message,
            pest,
            weather,
        } => {
            let input = planning::PlanInput {
                pest_info: pest,
                weather_info: weather,
                message,
            };
            commands::handle_plan(&config, field, run, date, owner, &input).await
        }
        Commands::Agenda { window } => commands::handle_agenda(&config, &window.into()).await,
        Commands::Progress { task, date, status } => {
            commands::handle_progress(&config, &task, &date, &status).await
        }
        Commands::Completion { window } => {
            commands::handle_completion(&config, &window.into()).await
        }
    }
}
