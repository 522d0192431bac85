//! Natural-feature descriptor generation via an external Node tool.
//!
//! The tool is invoked as `node app.js -i <image>` inside its own
//! directory and leaves `<stem>.fset`, `<stem>.fset3` and `<stem>.iset`
//! next to `app.js`. Those files are moved into the bundle's marker
//! directory under the pair's base name.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::DescriptorToolConfig;
use crate::process::{CommandRunner, CommandSpec};

pub const DESCRIPTOR_EXTENSIONS: &[&str] = &["fset", "fset3", "iset"];

pub struct DescriptorTool<'a> {
    config: &'a DescriptorToolConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> DescriptorTool<'a> {
    pub fn new(config: &'a DescriptorToolConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    fn script(&self) -> PathBuf {
        self.config.dir.join("app.js")
    }

    /// Tool directory and script are present and the Node runtime answers.
    pub fn is_available(&self) -> bool {
        if !self.config.dir.is_dir() || !self.script().is_file() {
            return false;
        }
        let probe = CommandSpec::new(&self.config.node)
            .arg("--version")
            .current_dir(&self.config.dir)
            .timeout(Duration::from_secs(30));
        match self.runner.run(&probe) {
            Ok(out) if out.success() => {
                tracing::debug!(version = %out.stdout.trim(), "descriptor tool runtime");
                true
            }
            _ => false,
        }
    }

    /// Generate descriptors for `image` and move them into `markers_dir`.
    ///
    /// Returns the number of files moved; zero means the tool produced nothing.
    pub fn generate(&self, image: &Path, markers_dir: &Path, base: &str) -> Result<usize> {
        let image = image
            .canonicalize()
            .with_context(|| format!("resolving marker image '{}'", image.display()))?;
        let spec = CommandSpec::new(&self.config.node)
            .arg("app.js")
            .arg("-i")
            .arg(&image)
            .current_dir(&self.config.dir)
            .timeout(Duration::from_secs(self.config.timeout_secs));

        let out = self.runner.run(&spec)?;
        if !out.success() || out.stderr.to_lowercase().contains("error") {
            anyhow::bail!(
                "descriptor tool failed for '{}':\n{}",
                image.display(),
                out.tail(crate::process::TAIL_LINES)
            );
        }

        let stem = image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        fs::create_dir_all(markers_dir)
            .with_context(|| format!("Failed to create {}", markers_dir.display()))?;

        let mut moved = 0;
        for ext in DESCRIPTOR_EXTENSIONS {
            let src = self.config.dir.join(format!("{}.{}", stem, ext));
            if !src.is_file() {
                continue;
            }
            let dst = markers_dir.join(format!("{}.{}", base, ext));
            crate::fsutil::atomic_move(&src, &dst)?;
            moved += 1;
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Pretends to be Node: writes descriptor files on `app.js` runs.
    struct FakeNode {
        dir: PathBuf,
        emit: &'static [&'static str],
        stderr: &'static str,
        calls: Mutex<Vec<String>>,
    }

    impl CommandRunner for FakeNode {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(spec.display());
            if spec.args.first().map(|a| a == "app.js").unwrap_or(false) {
                for ext in self.emit {
                    fs::write(self.dir.join(format!("page1.{}", ext)), b"d").unwrap();
                }
            }
            Ok(CommandOutput {
                code: Some(0),
                stdout: "v20.11.0\n".into(),
                stderr: self.stderr.into(),
                timed_out: false,
            })
        }
    }

    fn setup(emit: &'static [&'static str], stderr: &'static str) -> (TempDir, DescriptorToolConfig, FakeNode) {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nft");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("app.js"), "").unwrap();
        fs::write(tmp.path().join("page1.jpg"), b"img").unwrap();
        let cfg = DescriptorToolConfig {
            dir: dir.clone(),
            node: PathBuf::from("node"),
            timeout_secs: 5,
        };
        let fake = FakeNode {
            dir,
            emit,
            stderr,
            calls: Mutex::new(Vec::new()),
        };
        (tmp, cfg, fake)
    }

    #[test]
    fn test_generate_moves_descriptors_under_base_name() {
        let (tmp, cfg, fake) = setup(&["fset", "fset3", "iset"], "");
        let tool = DescriptorTool::new(&cfg, &fake);
        assert!(tool.is_available());

        let markers = tmp.path().join("www/assets/markers");
        let moved = tool
            .generate(&tmp.path().join("page1.jpg"), &markers, "pagina_1")
            .unwrap();
        assert_eq!(moved, 3);
        assert!(markers.join("pagina_1.fset3").is_file());
        assert!(!cfg.dir.join("page1.iset").exists());
    }

    #[test]
    fn test_error_on_stderr_is_failure() {
        let (tmp, cfg, fake) = setup(&["fset"], "Error: cannot read image");
        let tool = DescriptorTool::new(&cfg, &fake);
        let markers = tmp.path().join("markers");
        assert!(tool
            .generate(&tmp.path().join("page1.jpg"), &markers, "p")
            .is_err());
    }

    #[test]
    fn test_unavailable_without_script() {
        let (_tmp, cfg, fake) = setup(&[], "");
        fs::remove_file(cfg.dir.join("app.js")).unwrap();
        let tool = DescriptorTool::new(&cfg, &fake);
        assert!(!tool.is_available());
        assert!(fake.calls.lock().unwrap().is_empty());
    }
}
