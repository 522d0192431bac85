//! Terminal failure taxonomy.
//!
//! Most functions in this crate return `anyhow::Result` and attach path
//! context as they go. Failures that callers need to tell apart are raised
//! as a [`PipelineError`] at the root of the chain; use [`PipelineError::find`]
//! to recover it from an `anyhow::Error`.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Why an external command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Output mentions storage exhaustion.
    Space,
    /// The wall-clock limit was hit and the process group was killed.
    Timeout,
    /// Any other non-zero exit.
    Toolchain,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Space => "space exhaustion",
            FailureKind::Timeout => "timeout",
            FailureKind::Toolchain => "toolchain error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("cannot read '{path}': {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("{tool} failed ({kind}):\n{tail}")]
    ExternalTool {
        tool: String,
        kind: FailureKind,
        tail: String,
    },

    #[error("project configuration: {0}")]
    ConfigPatch(String),

    #[error("artifact not produced: no '{name}' found under {searched:?}")]
    ArtifactNotFound { name: String, searched: Vec<PathBuf> },

    #[error("a build for package '{0}' is already in progress")]
    BuildInProgress(String),

    #[error("no asset pair could be processed ({failed} failed)")]
    NoUsablePairs { failed: usize },
}

impl PipelineError {
    /// Locate the typed failure anywhere in an `anyhow` chain.
    pub fn find(err: &anyhow::Error) -> Option<&PipelineError> {
        err.chain().find_map(|cause| cause.downcast_ref::<PipelineError>())
    }
}
