//! End-to-end packaging run.
//!
//! ```text
//! lock ─► assemble ─► template ─► patch ─► build ─► publish keys
//! ```
//!
//! Only one run per package may be active, and only one run at a time may
//! touch the shared native project and web bundle. Each run leaves a
//! `build-run.json` record under `<output_root>/<name>/`: written as
//! `building` when the run starts, rewritten with the final status.
//!
//! # Example
//!
//! ```rust,ignore
//! let handle = spawn_build(config, request)?;
//! let outcome = handle.join().map_err(|_| anyhow!("build thread panicked"))??;
//! println!("{}", outcome.report.artifact.path.display());
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use time::OffsetDateTime;

use crate::activation::{ActivationStore, SqliteStore};
use crate::assemble::{Assembler, PackageManifest, COVER_FILE};
use crate::config::PackagerConfig;
use crate::executor::{
    environment, BuildAttempt, BuildLock, BuildObserver, BuildReport, Executor, Fs2Probe,
    SpaceProbe, Strategy, TracingObserver,
};
use crate::fsutil::{copy_dir_recursive, reset_dir, write_file};
use crate::patch::{self, ProjectIdentity};
use crate::process::{CommandRunner, SystemRunner};
use crate::request::ContentRequest;
use crate::resolve;

pub const RUN_RECORD_FILE: &str = "build-run.json";
const LOCK_DIR: &str = ".locks";
const NATIVE_ASSETS: &str = "app/src/main/assets/public";

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub manifest: PackageManifest,
    pub report: BuildReport,
    pub keys_file: Option<PathBuf>,
    pub run_record: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub package: String,
    pub app_id: String,
    pub status: String,
    pub created_at_utc: String,
    pub finished_at_utc: Option<String>,
    pub strategy: Option<Strategy>,
    pub artifact: Option<PathBuf>,
    pub sha256: Option<String>,
    pub keys_file: Option<PathBuf>,
    pub markers: usize,
    pub skipped: Vec<String>,
    pub attempts: Vec<BuildAttempt>,
    pub error: Option<String>,
}

struct Produced {
    manifest: PackageManifest,
    report: BuildReport,
    keys_file: Option<PathBuf>,
}

fn now_utc_compact() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

fn write_record(path: &Path, record: &RunRecord) -> Result<()> {
    let text = serde_json::to_string_pretty(record).context("serializing run record")?;
    write_file(path, text + "\n")
}

pub fn lock_dir(config: &PackagerConfig) -> PathBuf {
    config.output_root.join(LOCK_DIR)
}

/// Locks held for the whole of a run. Released on drop.
#[derive(Debug)]
pub struct RunLocks {
    _package: BuildLock,
    _project: BuildLock,
}

/// Take the package lock for `name`, then the shared project lock.
pub fn acquire_locks(config: &PackagerConfig, name: &str) -> Result<RunLocks> {
    let dir = lock_dir(config);
    let package = BuildLock::acquire(&dir, name)?;
    let project = BuildLock::acquire_project(&dir)?;
    Ok(RunLocks {
        _package: package,
        _project: project,
    })
}

pub struct Pipeline<'a> {
    config: &'a PackagerConfig,
    runner: &'a dyn CommandRunner,
    probe: &'a dyn SpaceProbe,
    observer: &'a dyn BuildObserver,
    store: &'a dyn ActivationStore,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a PackagerConfig,
        runner: &'a dyn CommandRunner,
        probe: &'a dyn SpaceProbe,
        observer: &'a dyn BuildObserver,
        store: &'a dyn ActivationStore,
    ) -> Self {
        Self {
            config,
            runner,
            probe,
            observer,
            store,
        }
    }

    /// Take the run locks and run every stage.
    pub fn run(&self, request: &ContentRequest) -> Result<PipelineOutcome> {
        let _locks = acquire_locks(self.config, request.name())?;
        self.run_locked(request)
    }

    fn run_locked(&self, request: &ContentRequest) -> Result<PipelineOutcome> {
        let name = request.name();
        let record_path = self.config.output_dir(name).join(RUN_RECORD_FILE);
        let mut record = RunRecord {
            run_id: uuid::Uuid::new_v4().to_string(),
            package: name.to_string(),
            app_id: request.identity().app_id.clone(),
            status: "building".to_string(),
            created_at_utc: now_utc_compact(),
            finished_at_utc: None,
            strategy: None,
            artifact: None,
            sha256: None,
            keys_file: None,
            markers: 0,
            skipped: Vec::new(),
            attempts: Vec::new(),
            error: None,
        };
        write_record(&record_path, &record)?;
        tracing::info!(package = %name, run_id = %record.run_id, "packaging run started");

        let result = self.execute(request);

        record.finished_at_utc = Some(now_utc_compact());
        match &result {
            Ok(produced) => {
                record.status = "success".to_string();
                record.strategy = Some(produced.report.strategy);
                record.artifact = Some(produced.report.artifact.path.clone());
                record.sha256 = Some(produced.report.artifact.sha256.clone());
                record.keys_file = produced.keys_file.clone();
                record.markers = produced.manifest.entries.len();
                record.skipped = produced
                    .manifest
                    .skipped
                    .iter()
                    .map(|s| format!("{}: {}", s.base, s.reason))
                    .collect();
                record.attempts = produced.report.attempts.clone();
            }
            Err(err) => {
                record.status = "failed".to_string();
                record.error = Some(format!("{:#}", err));
            }
        }
        if let Err(err) = write_record(&record_path, &record) {
            if result.is_ok() {
                return Err(err);
            }
            tracing::warn!(error = %format!("{:#}", err), "failed to persist run record");
        }

        self.clean_scratch();

        let produced = result?;
        tracing::info!(
            package = %name,
            artifact = %produced.report.artifact.path.display(),
            "packaging run finished"
        );
        Ok(PipelineOutcome {
            manifest: produced.manifest,
            report: produced.report,
            keys_file: produced.keys_file,
            run_record: record_path,
        })
    }

    fn execute(&self, request: &ContentRequest) -> Result<Produced> {
        let config = self.config;
        let name = request.name();

        let manifest = Assembler::new(config, self.runner, self.store).assemble(request)?;

        let android = config.android_dir();
        patch::prepare_from_template(&config.template_project, &android)?;
        sync_web_bundle(&manifest.bundle_dir, &config.project_root.join("www"))?;
        sync_web_bundle(&manifest.bundle_dir, &android.join(NATIVE_ASSETS))?;
        patch::patch_project(&android, &ProjectIdentity::from_request(request))?;
        patch::write_launcher_icons(&android, &manifest.package_dir.join(COVER_FILE))?;

        let report = Executor::new(
            &config.build,
            &config.storage,
            self.runner,
            self.probe,
            self.observer,
        )
        .build(&android, name, &config.output_root)
        .with_context(|| format!("building '{}'", name))?;

        let keys_file = resolve::publish_keys(&config.output_root, name, &manifest.tokens)?;
        Ok(Produced {
            manifest,
            report,
            keys_file,
        })
    }

    fn clean_scratch(&self) {
        let temp = environment::relocated_temp(&self.config.storage);
        if temp.is_dir() {
            if let Err(err) = fs::remove_dir_all(&temp) {
                tracing::warn!(dir = %temp.display(), error = %err, "could not remove relocated temp dir");
            }
        }
    }
}

/// Mirror the assembled bundle into the project's `www` unless they are
/// already the same directory.
fn sync_web_bundle(bundle: &Path, www: &Path) -> Result<()> {
    if bundle == www {
        return Ok(());
    }
    reset_dir(www)?;
    copy_dir_recursive(bundle, www)
        .with_context(|| format!("copying web bundle into '{}'", www.display()))?;
    Ok(())
}

/// Start a run on a background thread.
///
/// The run locks are taken before the thread starts, so a second call for
/// the same package, or any call while another package holds the project,
/// fails here with `BuildInProgress` instead of queueing.
pub fn spawn_build(
    config: PackagerConfig,
    request: ContentRequest,
) -> Result<JoinHandle<Result<PipelineOutcome>>> {
    let locks = acquire_locks(&config, request.name())?;
    let handle = thread::Builder::new()
        .name(format!("build-{}", request.name()))
        .spawn(move || {
            let _locks = locks;
            let store = SqliteStore::open(&config.datastore)?;
            Pipeline::new(&config, &SystemRunner, &Fs2Probe, &TracingObserver, &store)
                .run_locked(&request)
        })
        .context("spawning build thread")?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sync_web_bundle_replaces_www() {
        let tmp = TempDir::new().unwrap();
        let bundle = tmp.path().join("bundle");
        let www = tmp.path().join("project/www");
        fs::create_dir_all(bundle.join("data")).unwrap();
        fs::write(bundle.join("index.html"), "<html>").unwrap();
        fs::create_dir_all(&www).unwrap();
        fs::write(www.join("old.html"), "x").unwrap();

        sync_web_bundle(&bundle, &www).unwrap();
        assert!(www.join("index.html").is_file());
        assert!(www.join("data").is_dir());
        assert!(!www.join("old.html").exists());
    }

    #[test]
    fn test_sync_web_bundle_same_dir_is_noop() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("index.html"), "<html>").unwrap();
        sync_web_bundle(tmp.path(), tmp.path()).unwrap();
        assert!(tmp.path().join("index.html").is_file());
    }

    #[test]
    fn test_run_locks_block_other_packages_until_dropped() {
        let tmp = TempDir::new().unwrap();
        let config = PackagerConfig {
            output_root: tmp.path().join("output"),
            ..PackagerConfig::default()
        };
        let held = acquire_locks(&config, "libro").unwrap();

        let err = acquire_locks(&config, "otro").unwrap_err();
        assert!(matches!(
            crate::PipelineError::find(&err),
            Some(crate::PipelineError::BuildInProgress(name)) if name == crate::executor::PROJECT_LOCK
        ));
        // the failed attempt released the package lock it had taken
        assert!(BuildLock::acquire(&lock_dir(&config), "otro").is_ok());

        drop(held);
        assert!(acquire_locks(&config, "otro").is_ok());
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = now_utc_compact();
        assert_eq!(ts.len(), 16);
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[8..9], "T");
    }
}
