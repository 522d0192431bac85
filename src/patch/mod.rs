//! Native project configuration.
//!
//! The Android project is recreated from its template at the start of every
//! build ([`prepare_from_template`]) and then brought in line with the
//! package identity ([`patch_project`]). Most files are regenerated whole;
//! `app/build.gradle` keeps the template's content and only its identity
//! declarations are overlaid.
//!
//! # Example
//!
//! ```rust,ignore
//! prepare_from_template(&config.template_project, &android_dir)?;
//! patch_project(&android_dir, &ProjectIdentity::from_request(&request))?;
//! write_launcher_icons(&android_dir, &manifest.package_dir.join(COVER_FILE))?;
//! ```

pub mod capacitor;
pub mod icons;
pub mod overlay;
pub mod templates;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::fsutil::{copy_dir_recursive, reset_dir, write_file};
use crate::request::ContentRequest;
use overlay::{Directive, Overlay};

pub use icons::write_launcher_icons;

/// Written into a project freshly copied from its template.
pub const TEMPLATE_STAMP: &str = ".ar-packager-template";

const APP_BUILD_GRADLE: &str = "app/build.gradle";
const MAIN_DIR: &str = "app/src/main";

/// Identity fields written into the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIdentity {
    pub app_id: String,
    pub app_name: String,
    pub build_dir_override: Option<PathBuf>,
    pub backend_host: Option<String>,
}

impl ProjectIdentity {
    pub fn from_request(request: &ContentRequest) -> Self {
        let identity = request.identity();
        Self {
            app_id: identity.app_id.clone(),
            app_name: identity.display_name.clone(),
            build_dir_override: None,
            backend_host: request.backend_host().map(str::to_string),
        }
    }
}

/// Wipe `android_dir` and recopy it from `template`, leaving a stamp.
pub fn prepare_from_template(template: &Path, android_dir: &Path) -> Result<()> {
    if !template.is_dir() {
        return Err(PipelineError::ConfigPatch(format!(
            "project template '{}' does not exist",
            template.display()
        ))
        .into());
    }
    reset_dir(android_dir)?;
    copy_dir_recursive(template, android_dir)?;
    write_file(
        &android_dir.join(TEMPLATE_STAMP),
        format!("template={}\nversion={}\n", template.display(), templates::TEMPLATE_VERSION),
    )?;
    tracing::info!(
        template = %template.display(),
        project = %android_dir.display(),
        "native project recreated from template"
    );
    Ok(())
}

fn gradle_overlay(identity: &ProjectIdentity) -> Overlay {
    let overlay = Overlay::new()
        .with(Directive::namespace(&identity.app_id))
        .with(Directive::application_id(&identity.app_id));
    match &identity.build_dir_override {
        Some(dir) => overlay.with(Directive::build_dir(dir)),
        None => overlay,
    }
}

fn overlay_file(path: &Path, overlay: &Overlay) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading '{}'", path.display()))?;
    let patched = overlay
        .apply(&text)
        .with_context(|| format!("patching '{}'", path.display()))?;
    if patched != text {
        fs::write(path, patched).with_context(|| format!("writing '{}'", path.display()))?;
    }
    Ok(())
}

/// Bring the project at `android_dir` in line with `identity`.
///
/// Running this twice with the same identity leaves every file byte-identical
/// to a single run.
pub fn patch_project(android_dir: &Path, identity: &ProjectIdentity) -> Result<()> {
    let gradle = android_dir.join(APP_BUILD_GRADLE);
    if !gradle.is_file() {
        if android_dir.join(TEMPLATE_STAMP).is_file() {
            return Err(PipelineError::ConfigPatch(format!(
                "'{}' is missing after template copy",
                gradle.display()
            ))
            .into());
        }
        write_file(&gradle, templates::APP_BUILD_GRADLE)?;
        tracing::info!(file = %gradle.display(), "created module build file from template");
    }
    overlay_file(&gradle, &gradle_overlay(identity))?;

    write_file(&android_dir.join("build.gradle"), templates::ROOT_BUILD_GRADLE)?;
    write_file(
        &android_dir.join("gradle.properties"),
        templates::gradle_properties(),
    )?;

    let main = android_dir.join(MAIN_DIR);
    write_file(&main.join("AndroidManifest.xml"), templates::android_manifest())?;

    let res = main.join("res");
    write_file(
        &res.join("values/strings.xml"),
        templates::strings_xml(&identity.app_name, &identity.app_id),
    )?;
    write_file(&res.join("values/styles.xml"), templates::STYLES_XML)?;
    write_file(&res.join("values/colors.xml"), templates::COLORS_XML)?;
    write_file(
        &res.join("drawable/splash_background.xml"),
        templates::SPLASH_BACKGROUND_XML,
    )?;
    write_file(&res.join("xml/file_paths.xml"), templates::FILE_PATHS_XML)?;
    write_file(
        &res.join("xml/network_security_config.xml"),
        templates::network_security_config(identity.backend_host.as_deref()),
    )?;

    let package_path: PathBuf = identity.app_id.split('.').collect();
    write_file(
        &main.join("java").join(package_path).join("MainActivity.java"),
        templates::main_activity(&identity.app_id),
    )?;

    if let Some(project_root) = android_dir.parent() {
        capacitor::write_capacitor_config(project_root, &identity.app_id, &identity.app_name)?;
    }

    tracing::info!(app_id = %identity.app_id, "project configuration patched");
    Ok(())
}

/// Point the module's build output at `dir`. Used when switching to the
/// relocated build strategy.
pub fn set_build_dir(android_dir: &Path, dir: &Path) -> Result<()> {
    let gradle = android_dir.join(APP_BUILD_GRADLE);
    if !gradle.is_file() {
        return Err(PipelineError::ConfigPatch(format!(
            "cannot redirect build output: '{}' is missing",
            gradle.display()
        ))
        .into());
    }
    overlay_file(&gradle, &Overlay::new().with(Directive::build_dir(dir)))
}

/// Current build output override, if the module declares one.
pub fn read_build_dir(android_dir: &Path) -> Result<Option<PathBuf>> {
    let gradle = android_dir.join(APP_BUILD_GRADLE);
    let text = fs::read_to_string(&gradle)
        .with_context(|| format!("reading '{}'", gradle.display()))?;
    Ok(text.lines().find_map(|line| {
        let rest = line.trim_start().strip_prefix("buildDir")?;
        let start = rest.find("file(\"")? + "file(\"".len();
        let end = start + rest[start..].find('"')?;
        Some(PathBuf::from(&rest[start..end]))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    fn identity() -> ProjectIdentity {
        ProjectIdentity {
            app_id: "com.librosdar.libro".into(),
            app_name: "libro".into(),
            build_dir_override: None,
            backend_host: Some("api.example.org".into()),
        }
    }

    fn template(tmp: &TempDir) -> PathBuf {
        let t = tmp.path().join("template/android");
        fs::create_dir_all(t.join("app/src/main")).unwrap();
        fs::write(
            t.join("app/build.gradle"),
            "apply plugin: 'com.android.application'\n\nandroid {\n    namespace \"com.getcapacitor.myapp\"\n    defaultConfig {\n        applicationId \"com.getcapacitor.myapp\"\n    }\n}\n",
        )
        .unwrap();
        fs::write(t.join("gradlew"), "#!/bin/sh\n").unwrap();
        t
    }

    fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files: Vec<_> = WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| (e.path().to_path_buf(), fs::read(e.path()).unwrap()))
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_patch_twice_is_identical() {
        let tmp = TempDir::new().unwrap();
        let android = tmp.path().join("project/android");
        prepare_from_template(&template(&tmp), &android).unwrap();

        let mut id = identity();
        id.build_dir_override = Some(tmp.path().join("alt/build"));
        patch_project(&android, &id).unwrap();
        let first = snapshot(&tmp.path().join("project"));
        patch_project(&android, &id).unwrap();
        assert_eq!(first, snapshot(&tmp.path().join("project")));

        let gradle = fs::read_to_string(android.join(APP_BUILD_GRADLE)).unwrap();
        assert_eq!(gradle.matches("namespace").count(), 1);
        assert!(gradle.contains("applicationId \"com.librosdar.libro\""));
        assert!(android
            .join("app/src/main/java/com/librosdar/libro/MainActivity.java")
            .is_file());
        assert!(tmp.path().join("project/capacitor.config.json").is_file());
    }

    #[test]
    fn test_missing_gradle_after_template_copy_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let android = tmp.path().join("android");
        let t = template(&tmp);
        fs::remove_file(t.join("app/build.gradle")).unwrap();
        prepare_from_template(&t, &android).unwrap();

        let err = patch_project(&android, &identity()).unwrap_err();
        assert!(matches!(
            PipelineError::find(&err),
            Some(PipelineError::ConfigPatch(_))
        ));
    }

    #[test]
    fn test_missing_gradle_without_template_is_created() {
        let tmp = TempDir::new().unwrap();
        let android = tmp.path().join("android");
        fs::create_dir_all(&android).unwrap();
        patch_project(&android, &identity()).unwrap();
        let gradle = fs::read_to_string(android.join(APP_BUILD_GRADLE)).unwrap();
        assert!(gradle.contains("namespace \"com.librosdar.libro\""));
    }

    #[test]
    fn test_template_recopy_drops_previous_edits() {
        let tmp = TempDir::new().unwrap();
        let android = tmp.path().join("android");
        let t = template(&tmp);
        prepare_from_template(&t, &android).unwrap();
        fs::write(android.join("leftover.txt"), "x").unwrap();
        prepare_from_template(&t, &android).unwrap();
        assert!(!android.join("leftover.txt").exists());
        assert!(android.join(TEMPLATE_STAMP).is_file());
    }

    #[test]
    fn test_set_and_read_build_dir() {
        let tmp = TempDir::new().unwrap();
        let android = tmp.path().join("android");
        prepare_from_template(&template(&tmp), &android).unwrap();
        assert_eq!(read_build_dir(&android).unwrap(), None);

        set_build_dir(&android, Path::new("/mnt/alt/build/libro")).unwrap();
        assert_eq!(
            read_build_dir(&android).unwrap(),
            Some(PathBuf::from("/mnt/alt/build/libro"))
        );
    }
}
