//! End-to-end packaging runs against a scripted toolchain.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use ar_packager::activation::SqliteStore;
use ar_packager::config::{BuildPolicy, StorageProfile};
use ar_packager::executor::{BuildLock, SpaceProbe, TracingObserver, PROJECT_LOCK};
use ar_packager::patch;
use ar_packager::pipeline::{self, spawn_build, Pipeline};
use ar_packager::process::{CommandOutput, CommandRunner, CommandSpec};
use ar_packager::{PackagerConfig, PipelineError, RequestDraft, Strategy};
use image::{Rgb, RgbImage};
use tempfile::TempDir;

const GB: u64 = 1024 * 1024 * 1024;

/// Succeeds at everything. A compile drops an APK wherever the module's
/// build output currently points.
struct FakeToolchain {
    android: PathBuf,
    compiles: Mutex<Vec<Option<PathBuf>>>,
}

impl CommandRunner for FakeToolchain {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        if spec.tool_name() == "gradlew" {
            let override_dir = patch::read_build_dir(&self.android)?;
            let dir = override_dir
                .clone()
                .unwrap_or_else(|| self.android.join("app/build"));
            let apk = dir.join("outputs/apk/debug/app-debug.apk");
            fs::create_dir_all(apk.parent().unwrap())?;
            fs::write(&apk, b"PK\x03\x04 fake apk")?;
            self.compiles.lock().unwrap().push(override_dir);
        }
        Ok(CommandOutput {
            code: Some(0),
            ..Default::default()
        })
    }
}

struct FixedProbe(u64);

impl SpaceProbe for FixedProbe {
    fn available(&self, _path: &Path) -> Result<u64> {
        Ok(self.0)
    }
}

struct Workspace {
    tmp: TempDir,
    config: PackagerConfig,
}

impl Workspace {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        let template = root.join("template/android");
        fs::create_dir_all(template.join("app/src/main")).unwrap();
        fs::write(
            template.join("app/build.gradle"),
            "apply plugin: 'com.android.application'\n\nandroid {\n    namespace \"com.getcapacitor.myapp\"\n    defaultConfig {\n        applicationId \"com.getcapacitor.myapp\"\n    }\n}\n",
        )
        .unwrap();
        fs::write(template.join("gradlew"), "#!/bin/sh\n").unwrap();

        let config = PackagerConfig {
            packages_root: root.join("paquetes"),
            web_bundle_root: root.join("project/www"),
            output_root: root.join("output"),
            template_project: template,
            project_root: root.join("project"),
            datastore: root.join("activaciones.db"),
            build: BuildPolicy {
                sync_retry_delay_secs: 0,
                compile_retry_delay_secs: 0,
                ..BuildPolicy::default()
            },
            storage: StorageProfile {
                primary_cache: root.join("home/.gradle"),
                relocated_root: root.join("alt"),
                critical_free_gb: 4,
                warning_free_gb: 8,
            },
            ..PackagerConfig::default()
        };
        Self { tmp, config }
    }

    fn input(&self, rel: &str) -> PathBuf {
        self.tmp.path().join("input").join(rel)
    }

    fn image(&self, rel: &str, shade: u8) -> PathBuf {
        let path = self.input(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_fn(64, 64, |x, y| {
            if (x / 16 + y / 16) % 2 == 0 {
                Rgb([shade, shade, shade])
            } else {
                Rgb([255, 255, 255])
            }
        })
        .save(&path)
        .unwrap();
        path
    }

    fn model(&self, rel: &str) -> PathBuf {
        let path = self.input(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"glTF\x02\x00\x00\x00").unwrap();
        path
    }

    fn draft(&self, images: Vec<PathBuf>, models: Vec<PathBuf>, key_count: u32) -> RequestDraft {
        RequestDraft {
            name: "Libro Uno".into(),
            backend_url: "https://api.example.org".into(),
            cover: self.image("cover.png", 40),
            images,
            models,
            key_count,
        }
    }

    fn toolchain(&self) -> FakeToolchain {
        FakeToolchain {
            android: self.config.android_dir(),
            compiles: Mutex::new(Vec::new()),
        }
    }
}

fn count_ext(dir: &Path, ext: &str) -> usize {
    fs::read_dir(dir)
        .map(|it| {
            it.filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|x| x == ext))
                .count()
        })
        .unwrap_or(0)
}

#[test]
fn test_two_pairs_five_keys_end_to_end() {
    let ws = Workspace::new();
    let images = vec![ws.image("gato.png", 0), ws.image("perro.png", 90)];
    let models = vec![ws.model("gato.glb"), ws.model("perro.glb")];
    let request = ws
        .draft(images, models, 5)
        .validate(&ws.config.app_id_prefix)
        .unwrap();
    assert_eq!(request.name(), "librouno");

    let store = SqliteStore::open(&ws.config.datastore).unwrap();
    let runner = ws.toolchain();
    let outcome = Pipeline::new(&ws.config, &runner, &FixedProbe(100 * GB), &TracingObserver, &store)
        .run(&request)
        .unwrap();

    let package = ws.config.package_dir("librouno");
    assert_eq!(count_ext(&package.join("patterns"), "patt"), 2);
    assert_eq!(count_ext(&package.join("models"), "glb"), 2);
    assert!(package.join("portada.jpg").is_file());
    assert!(package.join("index.html").is_file());

    assert_eq!(store.count().unwrap(), 5);
    let keys = fs::read_to_string(outcome.keys_file.as_ref().unwrap()).unwrap();
    let lines: Vec<_> = keys.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(outcome.keys_file.unwrap().file_name().unwrap(), "claves-activacion.txt");

    let out = ws.config.output_dir("librouno");
    assert_eq!(outcome.report.artifact.path, out.join("librouno.apk"));
    assert!(out.join("librouno.apk").is_file());
    assert_eq!(outcome.report.strategy, Strategy::Primary);

    // bundle reached both the project www and the native assets
    assert!(ws.config.project_root.join("www/data/model_props.json").is_file());
    assert!(ws
        .config
        .android_dir()
        .join("app/src/main/assets/public/index.html")
        .is_file());

    let gradle = fs::read_to_string(ws.config.android_dir().join("app/build.gradle")).unwrap();
    assert!(gradle.contains("applicationId \"com.librosdar.librouno\""));

    // the launcher shows the title as typed, not the normalized name
    let capacitor: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(ws.config.project_root.join("capacitor.config.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(capacitor["appName"], "Libro Uno");
    assert_eq!(capacitor["appId"], "com.librosdar.librouno");

    let res = ws.config.android_dir().join("app/src/main/res");
    let icon = image::open(res.join("mipmap-xxxhdpi/ic_launcher_round.png")).unwrap();
    assert_eq!((icon.width(), icon.height()), (192, 192));

    let record: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&outcome.run_record).unwrap()).unwrap();
    assert_eq!(record["status"], "success");
    assert_eq!(record["strategy"], "primary");
    assert_eq!(record["markers"], 2);
}

#[test]
fn test_low_space_builds_relocated() {
    let ws = Workspace::new();
    let request = ws
        .draft(vec![ws.image("gato.png", 0)], vec![ws.model("gato.glb")], 1)
        .validate(&ws.config.app_id_prefix)
        .unwrap();

    let store = SqliteStore::open_in_memory().unwrap();
    let runner = ws.toolchain();
    let outcome = Pipeline::new(&ws.config, &runner, &FixedProbe(2 * GB), &TracingObserver, &store)
        .run(&request)
        .unwrap();

    let alt_build = ws.config.storage.relocated_root.join("build/librouno");
    assert_eq!(outcome.report.strategy, Strategy::Relocated);
    assert_eq!(outcome.report.build_dir_override, Some(alt_build.clone()));
    assert_eq!(
        runner.compiles.lock().unwrap().as_slice(),
        &[Some(alt_build.clone())]
    );
    assert!(outcome.report.artifact.source.starts_with(&alt_build));
    assert!(!ws.config.storage.relocated_root.join("temp").exists());
}

#[test]
fn test_missing_model_skips_pair_only() {
    let ws = Workspace::new();
    let images = vec![ws.image("gato.png", 0), ws.image("perro.png", 90)];
    let models = vec![ws.model("gato.glb"), ws.input("perro.glb")];
    let request = ws
        .draft(images, models, 2)
        .validate(&ws.config.app_id_prefix)
        .unwrap();

    let store = SqliteStore::open_in_memory().unwrap();
    let runner = ws.toolchain();
    let outcome = Pipeline::new(&ws.config, &runner, &FixedProbe(100 * GB), &TracingObserver, &store)
        .run(&request)
        .unwrap();

    assert_eq!(outcome.manifest.entries.len(), 1);
    assert_eq!(outcome.manifest.skipped.len(), 1);
    assert_eq!(outcome.manifest.skipped[0].base, "perro");

    let package = ws.config.package_dir("librouno");
    assert!(package.join("patterns/gato.patt").is_file());
    assert!(!package.join("patterns/perro.patt").exists());
    assert!(ws.config.output_dir("librouno").join("librouno.apk").is_file());
}

#[test]
fn test_second_build_for_same_package_is_rejected() {
    let ws = Workspace::new();
    let request = ws
        .draft(vec![ws.image("gato.png", 0)], vec![ws.model("gato.glb")], 1)
        .validate(&ws.config.app_id_prefix)
        .unwrap();

    let _running = BuildLock::acquire(&pipeline::lock_dir(&ws.config), "librouno").unwrap();

    let err = spawn_build(ws.config.clone(), request.clone()).unwrap_err();
    assert!(matches!(
        PipelineError::find(&err),
        Some(PipelineError::BuildInProgress(name)) if name == "librouno"
    ));

    let store = SqliteStore::open_in_memory().unwrap();
    let runner = ws.toolchain();
    let err = Pipeline::new(&ws.config, &runner, &FixedProbe(100 * GB), &TracingObserver, &store)
        .run(&request)
        .unwrap_err();
    assert!(matches!(
        PipelineError::find(&err),
        Some(PipelineError::BuildInProgress(_))
    ));
    assert!(runner.compiles.lock().unwrap().is_empty());
}

#[test]
fn test_other_package_waits_for_shared_project() {
    let ws = Workspace::new();
    let request = ws
        .draft(vec![ws.image("gato.png", 0)], vec![ws.model("gato.glb")], 1)
        .validate(&ws.config.app_id_prefix)
        .unwrap();

    // another package's run holds the shared project
    let _other = pipeline::acquire_locks(&ws.config, "otrolibro").unwrap();

    let err = spawn_build(ws.config.clone(), request.clone()).unwrap_err();
    assert!(matches!(
        PipelineError::find(&err),
        Some(PipelineError::BuildInProgress(name)) if name == PROJECT_LOCK
    ));

    let store = SqliteStore::open_in_memory().unwrap();
    let runner = ws.toolchain();
    let err = Pipeline::new(&ws.config, &runner, &FixedProbe(100 * GB), &TracingObserver, &store)
        .run(&request)
        .unwrap_err();
    assert!(matches!(
        PipelineError::find(&err),
        Some(PipelineError::BuildInProgress(name)) if name == PROJECT_LOCK
    ));
    assert!(!ws.config.package_dir("librouno").exists());
    assert!(runner.compiles.lock().unwrap().is_empty());
}
