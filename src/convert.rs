//! 3-D model placement and conversion.
//!
//! Models already in binary glTF are copied as-is. Everything else is handed
//! to a headless Blender run with a generated import/export script.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ConverterConfig;
use crate::error::{FailureKind, PipelineError};
use crate::process::{CommandRunner, CommandSpec, TAIL_LINES};

pub const NATIVE_MODEL_EXT: &str = "glb";

pub struct ModelConverter<'a> {
    config: &'a ConverterConfig,
    runner: &'a dyn CommandRunner,
    scratch: PathBuf,
}

fn import_op(ext: &str) -> Option<&'static str> {
    match ext {
        "fbx" => Some("bpy.ops.import_scene.fbx"),
        "obj" => Some("bpy.ops.wm.obj_import"),
        "gltf" => Some("bpy.ops.import_scene.gltf"),
        "stl" => Some("bpy.ops.wm.stl_import"),
        "ply" => Some("bpy.ops.wm.ply_import"),
        _ => None,
    }
}

fn script_for(import: &str, src: &Path, dst: &Path) -> String {
    format!(
        r#"import bpy
bpy.ops.wm.read_homefile(use_empty=True)
{import}(filepath=r"{src}")
for o in bpy.context.scene.objects:
    o.select_set(o.type not in ('CAMERA', 'LIGHT'))
bpy.ops.object.transform_apply(location=False, rotation=True, scale=True)
bpy.ops.export_scene.gltf(filepath=r"{dst}", export_format='GLB', export_yup=True)
"#,
        import = import,
        src = src.display(),
        dst = dst.display()
    )
}

impl<'a> ModelConverter<'a> {
    /// `scratch` holds generated scripts; it is created on demand.
    pub fn new(config: &'a ConverterConfig, runner: &'a dyn CommandRunner, scratch: PathBuf) -> Self {
        Self {
            config,
            runner,
            scratch,
        }
    }

    /// Put `src` at `dst` in binary glTF form.
    pub fn place(&self, src: &Path, dst: &Path) -> Result<()> {
        if !src.is_file() {
            return Err(PipelineError::Io {
                path: src.to_path_buf(),
                reason: "model file does not exist".into(),
            }
            .into());
        }
        let ext = src
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if ext == NATIVE_MODEL_EXT {
            crate::fsutil::copy_file(src, dst)?;
            return Ok(());
        }
        self.convert(src, dst, &ext)
    }

    fn convert(&self, src: &Path, dst: &Path, ext: &str) -> Result<()> {
        let Some(import) = import_op(ext) else {
            bail!("unsupported model format '.{}': {}", ext, src.display());
        };
        let src = src
            .canonicalize()
            .with_context(|| format!("resolving model '{}'", src.display()))?;
        let parent = match dst.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
        let Some(file_name) = dst.file_name() else {
            bail!("model output path has no file name: {}", dst.display());
        };
        let dst_abs = parent
            .canonicalize()
            .with_context(|| format!("resolving output '{}'", dst.display()))?
            .join(file_name);

        fs::create_dir_all(&self.scratch)
            .with_context(|| format!("Failed to create {}", self.scratch.display()))?;
        let script = self
            .scratch
            .join(format!("to_glb_{}.py", uuid::Uuid::new_v4().simple()));
        fs::write(&script, script_for(import, &src, &dst_abs))
            .with_context(|| format!("Failed to write {}", script.display()))?;

        let spec = CommandSpec::new(&self.config.program)
            .arg("--background")
            .arg("--python")
            .arg(&script)
            .timeout(Duration::from_secs(self.config.timeout_secs));
        let result = self.runner.run(&spec);
        let _ = fs::remove_file(&script);
        let out = result?;

        if !out.success() {
            return Err(PipelineError::ExternalTool {
                tool: spec.tool_name(),
                kind: if out.timed_out {
                    FailureKind::Timeout
                } else {
                    FailureKind::Toolchain
                },
                tail: out.tail(TAIL_LINES),
            }
            .into());
        }
        let produced = fs::metadata(&dst_abs).map(|m| m.len()).unwrap_or(0);
        if produced == 0 {
            bail!(
                "converter exited cleanly but '{}' is missing or empty",
                dst_abs.display()
            );
        }
        tracing::info!(model = %src.display(), bytes = produced, "converted to glb");
        Ok(())
    }
}
