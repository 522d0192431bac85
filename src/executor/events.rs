//! Build progress events.

use std::fmt;

use super::classify::Classification;
use super::environment::Strategy;
use crate::resolve::Artifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    DependencySync,
    PlatformSync,
    Compile,
    Locate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::DependencySync => "dependency-sync",
            Stage::PlatformSync => "platform-sync",
            Stage::Compile => "compile",
            Stage::Locate => "locate",
        })
    }
}

/// A failed attempt, or a strategy that ran out of attempts.
#[derive(Debug, Clone)]
pub struct StageFailure<'a> {
    pub stage: Stage,
    pub strategy: Strategy,
    pub attempt: u32,
    pub exhausted: bool,
    pub classification: &'a Classification,
}

/// Receives typed progress from the executor. All methods default to no-ops.
pub trait BuildObserver: Send + Sync {
    fn on_stage_start(&self, _stage: Stage, _strategy: Strategy) {}
    fn on_attempt(&self, _stage: Stage, _strategy: Strategy, _attempt: u32, _max: u32) {}
    fn on_error(&self, _failure: &StageFailure<'_>) {}
    fn on_artifact(&self, _artifact: &Artifact) {}
}

/// Forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BuildObserver for TracingObserver {
    fn on_stage_start(&self, stage: Stage, strategy: Strategy) {
        tracing::info!(%stage, %strategy, "stage started");
    }

    fn on_attempt(&self, stage: Stage, strategy: Strategy, attempt: u32, max: u32) {
        tracing::info!(%stage, %strategy, attempt, max, "attempt");
    }

    fn on_error(&self, failure: &StageFailure<'_>) {
        let c = failure.classification;
        if failure.exhausted {
            tracing::error!(
                stage = %failure.stage,
                strategy = %failure.strategy,
                kind = %c.kind,
                "strategy exhausted:\n{}",
                c.diagnostic
            );
        } else {
            tracing::warn!(
                stage = %failure.stage,
                strategy = %failure.strategy,
                attempt = failure.attempt,
                kind = %c.kind,
                "attempt failed:\n{}",
                c.diagnostic
            );
        }
    }

    fn on_artifact(&self, artifact: &Artifact) {
        tracing::info!(
            path = %artifact.path.display(),
            size_mb = %format!("{:.2}", artifact.size as f64 / (1024.0 * 1024.0)),
            sha256 = %artifact.sha256,
            "artifact published"
        );
    }
}
