//!
//! centralized error type for the workflow
//!
//! Every failure carries the identifying coordinates (window) or genome id
//! of the failing unit so a run can be re-investigated and resumed without
//! re-executing the whole graph.
//!
use crate::common::{GenomeId, Window};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CgpError {
    /// Invalid chunk/overlap relationship, malformed chromosome-size input,
    /// bad run configuration or a cyclic job graph. Raised before any job
    /// is scheduled.
    #[error("config error: {message}")]
    Config { message: String },

    /// A window's alignment-extraction invocation failed. Fails the whole
    /// run: coverage must be complete before merge.
    #[error("extraction failed for window {window}: {message}")]
    Extraction { window: Window, message: String },

    /// A window's prediction invocation failed. Fails the whole run.
    #[error("prediction failed for window {window}: {message}")]
    Prediction { window: Window, message: String },

    /// One genome's merge/join failed. Other genomes' merges are unaffected
    /// but the run overall is reported as failed.
    #[error("merge failed for genome {genome}: {message}")]
    Merge { genome: GenomeId, message: String },

    /// A job was dispatched while one of its declared futures was still
    /// unresolved. Scheduling invariant violation, never retryable.
    #[error("unresolved dependency for job {job}")]
    UnresolvedDependency { job: String },

    /// An external command exited non-zero or could not be spawned.
    #[error("command `{command}` failed: {message}")]
    Process { command: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state (de)serialization error: {0}")]
    State(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CgpError>;

impl CgpError {
    pub fn config(message: impl Into<String>) -> Self {
        CgpError::Config {
            message: message.into(),
        }
    }

    pub fn process(command: impl Into<String>, message: impl Into<String>) -> Self {
        CgpError::Process {
            command: command.into(),
            message: message.into(),
        }
    }
}
