//! Build executor.
//!
//! Drives a patched Capacitor project through four strictly ordered stages:
//!
//! ```text
//! dependency-sync ──► platform-sync ──► compile ──► locate
//!  npm install         npx cap sync      gradlew      resolve::resolve
//! ```
//!
//! Free space is checked once before anything runs. With enough headroom
//! the compile stage tries the primary strategy and falls back to the
//! relocated one; below the critical threshold it starts relocated. Each
//! command gets at most `max_attempts` tries per strategy.

pub mod classify;
pub mod environment;
pub mod events;
pub mod lock;
pub mod storage;

pub use classify::{classify, Classification};
pub use environment::{BuildEnvironment, Strategy};
pub use events::{BuildObserver, Stage, StageFailure, TracingObserver};
pub use lock::{BuildLock, PROJECT_LOCK};
pub use storage::{Fs2Probe, Headroom, SpaceProbe};

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::config::{BuildPolicy, StorageProfile};
use crate::error::{FailureKind, PipelineError};
use crate::patch;
use crate::process::{CommandRunner, CommandSpec};
use crate::resolve::{self, Artifact};

const AR_JS_PACKAGE: &str = "@ar-js-org/ar.js";
const AR_JS_VERSION: &str = "3.4.7";
const CAMERA_PLUGIN: &str = "@capacitor/camera";

/// Outcome of one command attempt.
#[derive(Debug, Clone, Serialize)]
pub struct BuildAttempt {
    pub stage: Stage,
    pub strategy: Strategy,
    pub attempt: u32,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip)]
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub artifact: Artifact,
    pub strategy: Strategy,
    pub build_dir_override: Option<PathBuf>,
    pub attempts: Vec<BuildAttempt>,
}

pub struct Executor<'a> {
    policy: &'a BuildPolicy,
    storage: &'a StorageProfile,
    runner: &'a dyn CommandRunner,
    probe: &'a dyn SpaceProbe,
    observer: &'a dyn BuildObserver,
}

/// Compile-stage strategies to try, in order.
fn strategy_plan(headroom: Headroom) -> Vec<Strategy> {
    match headroom {
        Headroom::Critical(_) => vec![Strategy::Relocated],
        _ => vec![Strategy::Primary, Strategy::Relocated],
    }
}

impl<'a> Executor<'a> {
    pub fn new(
        policy: &'a BuildPolicy,
        storage: &'a StorageProfile,
        runner: &'a dyn CommandRunner,
        probe: &'a dyn SpaceProbe,
        observer: &'a dyn BuildObserver,
    ) -> Self {
        Self {
            policy,
            storage,
            runner,
            probe,
            observer,
        }
    }

    /// Build the project at `android_dir` and publish the artifact for `name`.
    pub fn build(&self, android_dir: &Path, name: &str, output_root: &Path) -> Result<BuildReport> {
        let project_root = android_dir.parent().with_context(|| {
            format!("android project '{}' has no parent directory", android_dir.display())
        })?;
        let mut attempts = Vec::new();

        let headroom = storage::check_headroom(
            self.probe,
            self.storage,
            &[self.storage.primary_cache.as_path(), project_root],
        );
        match headroom {
            Headroom::Critical(free) => {
                tracing::warn!(
                    free = %storage::format_gib(free),
                    "free space below critical threshold; building relocated"
                );
                storage::log_space_diagnostic(&[
                    ("gradle cache", self.storage.primary_cache.clone()),
                    ("project", project_root.to_path_buf()),
                    ("build output", android_dir.join("app").join("build")),
                ]);
            }
            Headroom::Low(free) => {
                tracing::warn!(free = %storage::format_gib(free), "free space is low")
            }
            Headroom::Ample(free) => {
                tracing::debug!(free = %storage::format_gib(free), "free space ok")
            }
            Headroom::Unknown => tracing::warn!("free space unknown; trying primary first"),
        }
        let plan = strategy_plan(headroom);

        clean_build_outputs(android_dir)?;
        ensure_capacitor_runtime(project_root)?;

        let sync_env = BuildEnvironment::for_strategy(plan[0], self.storage, name);
        sync_env.ensure_dirs()?;
        self.dependency_sync(project_root, &sync_env, &mut attempts)?;
        self.platform_sync(project_root, &sync_env, &mut attempts)?;

        let mut last_err = None;
        let mut used = None;
        for strategy in plan {
            let env = BuildEnvironment::for_strategy(strategy, self.storage, name);
            env.ensure_dirs()?;
            if let Some(dir) = env.build_dir() {
                patch::set_build_dir(android_dir, dir)?;
                tracing::info!(build_dir = %dir.display(), "build output redirected");
            }
            self.observer.on_stage_start(Stage::Compile, strategy);
            match self.run_with_retry(
                Stage::Compile,
                &env,
                compile_command(android_dir, &env, self.policy),
                self.policy.compile_retry_delay(),
                &mut attempts,
            ) {
                Ok(()) => {
                    used = Some(env);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let Some(env) = used else {
            return Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no build strategy was attempted")));
        };

        self.observer.on_stage_start(Stage::Locate, env.strategy());
        let build_dir_override = patch::read_build_dir(android_dir)?;
        let artifact = resolve::resolve(android_dir, build_dir_override.as_deref(), name, output_root)?;
        self.observer.on_artifact(&artifact);

        Ok(BuildReport {
            artifact,
            strategy: env.strategy(),
            build_dir_override,
            attempts,
        })
    }

    fn dependency_sync(
        &self,
        project_root: &Path,
        env: &BuildEnvironment,
        attempts: &mut Vec<BuildAttempt>,
    ) -> Result<()> {
        self.observer.on_stage_start(Stage::DependencySync, env.strategy());
        let timeout = Duration::from_secs(self.policy.dependency_timeout_secs);
        let npm = |args: &[&str]| {
            CommandSpec::new("npm")
                .args(args.iter().copied())
                .current_dir(project_root)
                .timeout(timeout)
        };
        let delay = self.policy.sync_retry_delay();

        self.run_with_retry(Stage::DependencySync, env, npm(&["install"]), delay, attempts)?;
        self.run_with_retry(
            Stage::DependencySync,
            env,
            npm(&["install", CAMERA_PLUGIN]),
            delay,
            attempts,
        )?;

        let probe = env.apply(npm(&["list", AR_JS_PACKAGE, "--depth=0"]));
        let present = self
            .runner
            .run(&probe)
            .map(|out| out.success() && out.stdout.contains(&format!("{}@{}", AR_JS_PACKAGE, AR_JS_VERSION)))
            .unwrap_or(false);
        if present {
            tracing::debug!("{}@{} already installed", AR_JS_PACKAGE, AR_JS_VERSION);
        } else {
            let spec = format!("{}@{}", AR_JS_PACKAGE, AR_JS_VERSION);
            self.run_with_retry(
                Stage::DependencySync,
                env,
                npm(&["install", spec.as_str(), "--save"]),
                delay,
                attempts,
            )?;
        }
        Ok(())
    }

    fn platform_sync(
        &self,
        project_root: &Path,
        env: &BuildEnvironment,
        attempts: &mut Vec<BuildAttempt>,
    ) -> Result<()> {
        self.observer.on_stage_start(Stage::PlatformSync, env.strategy());
        let spec = CommandSpec::new("npx")
            .args(["cap", "sync", "android"])
            .current_dir(project_root)
            .timeout(Duration::from_secs(self.policy.sync_timeout_secs));
        self.run_with_retry(
            Stage::PlatformSync,
            env,
            spec,
            self.policy.sync_retry_delay(),
            attempts,
        )
    }

    /// Run `spec` until it succeeds or the attempt cap is reached.
    fn run_with_retry(
        &self,
        stage: Stage,
        env: &BuildEnvironment,
        spec: CommandSpec,
        delay: Duration,
        attempts: &mut Vec<BuildAttempt>,
    ) -> Result<()> {
        let spec = env.apply(spec);
        let max = self.policy.max_attempts.max(1);
        let mut last = None;

        for attempt in 1..=max {
            self.observer.on_attempt(stage, env.strategy(), attempt, max);
            let out = self.runner.run(&spec)?;
            if out.success() {
                attempts.push(BuildAttempt {
                    stage,
                    strategy: env.strategy(),
                    attempt,
                    command: spec.display(),
                    failure: None,
                    output: out.combined(),
                });
                return Ok(());
            }

            let classification = classify(&out);
            attempts.push(BuildAttempt {
                stage,
                strategy: env.strategy(),
                attempt,
                command: spec.display(),
                failure: Some(classification.kind),
                output: out.combined(),
            });
            self.observer.on_error(&StageFailure {
                stage,
                strategy: env.strategy(),
                attempt,
                exhausted: attempt == max,
                classification: &classification,
            });
            last = Some(classification);
            if attempt < max && !delay.is_zero() {
                thread::sleep(delay);
            }
        }

        let last = last.unwrap_or_else(|| Classification {
            kind: FailureKind::Toolchain,
            diagnostic: String::new(),
            tail: String::new(),
        });
        Err(PipelineError::ExternalTool {
            tool: spec.tool_name(),
            kind: last.kind,
            tail: last.report(),
        })
        .with_context(|| format!("{} failed under {} strategy", stage, env.strategy()))
    }
}

fn compile_command(android_dir: &Path, env: &BuildEnvironment, policy: &BuildPolicy) -> CommandSpec {
    let gradlew = if cfg!(windows) { "gradlew.bat" } else { "gradlew" };
    let mut home = std::ffi::OsString::from("--gradle-user-home=");
    home.push(env.gradle_home());
    CommandSpec::new(android_dir.join(gradlew))
        .args(["assembleDebug", "--no-daemon"])
        .arg(home)
        .arg("--stacktrace")
        .current_dir(android_dir)
        .timeout(Duration::from_secs(policy.compile_timeout_secs))
}

/// Remove stale outputs so a failed previous build cannot satisfy `locate`.
fn clean_build_outputs(android_dir: &Path) -> Result<()> {
    for rel in ["app/build", "build", ".gradle"] {
        let dir = android_dir.join(rel);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
            tracing::debug!(dir = %dir.display(), "removed stale build output");
        }
    }
    Ok(())
}

/// Copy the Capacitor runtime into `www` if the bundle lacks it.
fn ensure_capacitor_runtime(project_root: &Path) -> Result<()> {
    let dest = project_root.join("www").join("capacitor.js");
    if dest.is_file() {
        return Ok(());
    }
    let dist = project_root.join("node_modules/@capacitor/core/dist");
    match ["capacitor.js", "index.js"]
        .iter()
        .map(|f| dist.join(f))
        .find(|p| p.is_file())
    {
        Some(src) => {
            crate::fsutil::copy_file(&src, &dest)?;
            tracing::info!(from = %src.display(), "capacitor runtime copied into www");
        }
        None => tracing::debug!("capacitor runtime not present yet; platform sync will provide it"),
    }
    Ok(())
}
