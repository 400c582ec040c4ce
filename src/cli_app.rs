//! Top-level CLI definition and dispatch.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use loadcore::core::config::Config;
use loadcore::core::errors::LoadError;
use loadcore::engine::coordinator::{ConcurrencyConfig, ConfigurationSet, Execution, RunReport};
use loadcore::generator::{Generator, SeededByteBufferGenerator, fixed_length};
use loadcore::logger::jsonl::{EventLog, JsonlConfig};
use loadcore::workload::{PayloadCheck, PayloadScenario, times};

/// loadcore — fan a fixed number of iterations out over a worker pool.
#[derive(Debug, Parser)]
#[command(
    name = "loadcore",
    author,
    version,
    about = "Load-generation execution core",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the built-in payload workload.
    Run(RunArgs),
    /// Show how iterations would be split across threads.
    Plan(PlanArgs),
    /// Print the effective configuration.
    Config,
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Worker thread count.
    #[arg(long, value_name = "N")]
    threads: Option<usize>,
    /// Give up waiting after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    timeout_secs: Option<u64>,
    /// Total iterations across all threads.
    #[arg(long, value_name = "N")]
    iterations: Option<u64>,
    /// Bytes per generated payload.
    #[arg(long, value_name = "BYTES")]
    payload_len: Option<usize>,
    /// Derive payloads from the iteration seed.
    #[arg(long)]
    seeded: bool,
    /// Do not write the JSONL run log.
    #[arg(long)]
    no_log: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct PlanArgs {
    /// Worker thread count.
    #[arg(long, value_name = "N")]
    threads: Option<usize>,
    /// Total iterations across all threads.
    #[arg(long, value_name = "N")]
    iterations: Option<u64>,
}

/// CLI-level failures mapped to process exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Run did not finish: timeout, interruption, or environment failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Run finished but some tasks failed.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<LoadError> for CliError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::InvalidConfig { .. }
            | LoadError::MissingConfig { .. }
            | LoadError::ConfigParse { .. }
            | LoadError::InvalidThreadIndex { .. } => Self::User(err.to_string()),
            LoadError::ExecutionTimedOut { .. }
            | LoadError::ExecutionInterrupted { .. }
            | LoadError::Io { .. }
            | LoadError::Runtime { .. } => Self::Runtime(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

/// Dispatch a parsed command line.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Run(args) => run_load(cli, args),
        Command::Plan(args) => run_plan(cli, args),
        Command::Config => show_config(cli),
    }
}

#[derive(Debug, Serialize)]
struct RunSummary {
    #[serde(flatten)]
    report: RunReport,
    iterations: u64,
    bytes: u64,
    config_hash: String,
}

fn run_load(cli: &Cli, args: &RunArgs) -> Result<(), CliError> {
    let mut cfg = Config::load(cli.config.as_deref())?;
    if let Some(threads) = args.threads {
        cfg.concurrency.threads = threads;
    }
    if let Some(secs) = args.timeout_secs {
        cfg.concurrency.timeout_secs = secs;
    }
    if let Some(iterations) = args.iterations {
        cfg.workload.iterations = iterations;
    }
    if let Some(len) = args.payload_len {
        cfg.workload.payload_len = len;
    }
    cfg.workload.seeded |= args.seeded;
    cfg.validate()?;

    let mut concurrency = ConcurrencyConfig::from_settings(&cfg.concurrency)?;
    if cfg.logging.enabled && !args.no_log {
        let log = EventLog::open(JsonlConfig {
            path: cfg.logging.jsonl_path.clone(),
            max_size_bytes: cfg.logging.max_size_bytes,
            max_rotated_files: cfg.logging.max_rotated_files,
        });
        concurrency = concurrency.with_event_log(log);
    }
    concurrency.allocator().precompute(cfg.workload.iterations);
    #[cfg(feature = "signals")]
    concurrency.interrupt_handle().register_os_signals();

    let len = cfg.workload.payload_len;
    let generator: Arc<dyn Generator<Vec<u8>>> = if cfg.workload.seeded {
        Arc::new(SeededByteBufferGenerator::fixed_length(len))
    } else {
        Arc::new(fixed_length(len))
    };
    let scenario = Arc::new(PayloadScenario::new(generator));
    let configurations = Arc::new(
        ConfigurationSet::new()
            .with(concurrency.clone())
            .with(cfg.clone()),
    );
    let executions: Vec<Arc<dyn Execution<PayloadScenario, PayloadCheck>>> =
        vec![Arc::new(times(cfg.workload.iterations))];
    let checks: Arc<[PayloadCheck]> =
        Arc::from(vec![PayloadCheck::Length(len), PayloadCheck::UniformFill]);

    let report = concurrency.submit(&executions, Arc::clone(&scenario), configurations, checks)?;
    let summary = RunSummary {
        report,
        iterations: scenario.iterations(),
        bytes: scenario.bytes(),
        config_hash: cfg.stable_hash()?,
    };

    let mut out = io::stdout().lock();
    if cli.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
    } else {
        writeln!(
            out,
            "run complete: {} threads, {} tasks, {} iterations, {} bytes in {} ms",
            summary.report.threads,
            summary.report.tasks_completed,
            summary.iterations,
            summary.bytes,
            summary.report.elapsed_ms
        )?;
    }

    if summary.report.tasks_failed > 0 {
        return Err(CliError::Partial(format!(
            "{} of {} tasks failed",
            summary.report.tasks_failed, summary.report.tasks_submitted
        )));
    }
    Ok(())
}

fn run_plan(cli: &Cli, args: &PlanArgs) -> Result<(), CliError> {
    let cfg = Config::load(cli.config.as_deref())?;
    let threads = args.threads.unwrap_or(cfg.concurrency.threads);
    let iterations = args.iterations.unwrap_or(cfg.workload.iterations);

    let concurrency = ConcurrencyConfig::new().threads(threads)?;
    let table = concurrency.allocator().table(iterations);

    let mut out = io::stdout().lock();
    if cli.json {
        let payload = json!({
            "threads": threads,
            "iterations": iterations,
            "per_thread": table.as_slice(),
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?;
    } else {
        writeln!(out, "{iterations} iterations over {threads} threads:")?;
        for (thread_index, count) in table.as_slice().iter().enumerate() {
            writeln!(out, "  thread {thread_index:>3}: {count}")?;
        }
    }
    Ok(())
}

fn show_config(cli: &Cli) -> Result<(), CliError> {
    let cfg = Config::load(cli.config.as_deref())?;
    let mut out = io::stdout().lock();
    if cli.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&cfg)?)?;
    } else {
        write!(out, "{}", cfg.to_toml()?)?;
    }
    Ok(())
}
