//! Typed error hierarchy for the grading harness.
//!
//! Four top-level enums cover the four subsystems:
//! - `ConfigError` — CLI configuration failures, always fatal
//! - `ReportError` — report validation and serialization failures
//! - `RegistryError` — callback discovery failures under strict mode
//! - `CommandError` — external-process session failures

use thiserror::Error;

/// Errors from CLI configuration. Every variant is fatal: the binary
/// exits non-zero without producing a report.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unrecognized output format '{0}' (supported: json)")]
    UnknownFormat(String),

    #[error("Cannot request pretty-print without json formatting")]
    PrettyPrintWithoutJson,

    #[error("No grading target registered under '{name}' (available: {available:?})")]
    TargetNotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("Failed to write report to {path}: {source}")]
    ReportWrite {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from report validation and emission.
///
/// Validation failures are their own kind so callers can distinguish a
/// malformed report from a misconfigured run.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report requires an overall score or at least one graded test result")]
    EmptyReport,

    #[error("'{value}' is not a valid visibility (valid: {valid})")]
    InvalidVisibility { value: String, valid: String },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from callback discovery under the default strict mode.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Callback '{name}' is registered more than once")]
    DuplicateCallback { name: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from external-process sessions.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Cannot execute an empty command line")]
    EmptyCommand,

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to child stdin: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("Failed to collect child output: {0}")]
    Output(#[source] std::io::Error),

    #[error("'{command}' timed out after {timeout:?}")]
    TimedOut {
        command: String,
        timeout: std::time::Duration,
    },
}
