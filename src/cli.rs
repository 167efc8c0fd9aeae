//! Command-line surface of the harness binary.
//!
//! The flow is fixed: validate the output configuration, resolve the
//! target, discover its callbacks, run them against a fresh grader, and
//! deliver the report. Configuration problems are fatal before any
//! grading starts; callback failures during the run are logged and the
//! report still goes out.

use anyhow::Result;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::errors::ConfigError;
use crate::grader::Grader;
use crate::registry::{CallbackRegistry, TargetRegistry};
use crate::report::{JsonReportFormatter, ReportFormatter};

#[derive(Parser, Debug)]
#[command(name = "gradekit")]
#[command(version, about = "Run grading callbacks over a target and emit a platform JSON report")]
pub struct Cli {
    /// Identifier of the registered grading target to run
    #[arg(short, long)]
    pub target: String,

    /// Report format (only "json" is supported)
    #[arg(short, long, default_value = "json")]
    pub format: String,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Produce no report at all
    #[arg(long)]
    pub no_output: bool,

    /// Pretty-print the JSON report with a 2-space indent
    #[arg(long)]
    pub pretty_print: bool,

    /// Visibility for the whole report
    #[arg(long)]
    pub visibility: Option<String>,

    /// Visibility for captured stdout
    #[arg(long)]
    pub stdout_visibility: Option<String>,

    /// Verbose diagnostics on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// Initialise the global tracing subscriber.
///
/// Respects `RUST_LOG`; falls back to info (debug with `--verbose`).
/// Diagnostics go to stderr so the report stream stays clean. Safe to
/// call more than once; only the first call takes effect.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .ok();
}

/// Parse the process arguments and grade.
pub fn run(targets: &TargetRegistry) -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run_with(targets, cli)
}

/// Grade with already-parsed arguments. Split out so tests can drive
/// the full flow without a child process.
pub fn run_with(targets: &TargetRegistry, cli: Cli) -> Result<()> {
    let formatter = build_formatter(&cli)?;

    let target = targets
        .get(&cli.target)
        .ok_or_else(|| ConfigError::TargetNotFound {
            name: cli.target.clone(),
            available: targets.names(),
        })?;

    let callbacks = CallbackRegistry::discover(target)?;
    for warning in callbacks.warnings() {
        warn!("{warning}");
    }
    if callbacks.is_empty() {
        warn!(target = %cli.target, "target registered no callbacks");
    }

    let mut grader = Grader::new();
    let failures = callbacks.run(&mut grader);
    if failures > 0 {
        warn!(failures, "grading callbacks failed; the report may be partial");
    }

    let Some(formatter) = formatter else {
        return Ok(());
    };
    let report = formatter.format(&grader)?;
    match &cli.output {
        Some(path) => {
            fs::write(path, &report).map_err(|source| ConfigError::ReportWrite {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{report}"),
    }
    Ok(())
}

/// Validate the output flags and build the formatter. `None` means the
/// report is suppressed.
fn build_formatter(cli: &Cli) -> Result<Option<JsonReportFormatter>> {
    match cli.format.as_str() {
        "json" => {}
        other => return Err(ConfigError::UnknownFormat(other.to_string()).into()),
    }
    if cli.no_output {
        if cli.pretty_print {
            return Err(ConfigError::PrettyPrintWithoutJson.into());
        }
        return Ok(None);
    }

    let mut formatter = JsonReportFormatter::new();
    if cli.pretty_print {
        formatter.set_pretty_print(2);
    }
    if let Some(visibility) = &cli.visibility {
        formatter.set_visibility(visibility)?;
    }
    if let Some(visibility) = &cli.stdout_visibility {
        formatter.set_stdout_visibility(visibility)?;
    }
    Ok(Some(formatter))
}
