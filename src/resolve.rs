//! Artifact resolution and publication.
//!
//! After a successful compile the debug APK is looked up in this order:
//!
//! 1. `<build_dir_override>/outputs/apk/debug/app-debug.apk`
//! 2. `<android>/app/build/outputs/apk/debug/app-debug.apk`
//! 3. a depth-bounded search of both directories for `app-debug.apk`
//!
//! The first hit is copied to `<output_root>/<name>/<name>.apk` with a
//! `.sha256` sidecar. A miss is reported as
//! [`PipelineError::ArtifactNotFound`], separately from compile failures.

use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::PipelineError;
use crate::fsutil::{copy_file, sha256_file, write_file};

pub const ARTIFACT_NAME: &str = "app-debug.apk";
pub const ARTIFACT_EXT: &str = "apk";
pub const KEYS_FILE: &str = "claves-activacion.txt";

const OUTPUT_SUBPATH: &str = "outputs/apk/debug";
const SEARCH_DEPTH: usize = 8;

/// A published build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Where the toolchain left it.
    pub source: PathBuf,
    /// Canonical published copy.
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
}

/// Find the compiled artifact without publishing it.
pub fn locate(android_dir: &Path, build_dir_override: Option<&Path>) -> Result<PathBuf, PipelineError> {
    let default_build = android_dir.join("app").join("build");

    let mut direct = Vec::new();
    if let Some(dir) = build_dir_override {
        direct.push(dir.join(OUTPUT_SUBPATH).join(ARTIFACT_NAME));
    }
    direct.push(default_build.join(OUTPUT_SUBPATH).join(ARTIFACT_NAME));
    if let Some(hit) = direct.into_iter().find(|p| p.is_file()) {
        return Ok(hit);
    }

    let roots: Vec<PathBuf> = build_dir_override
        .map(Path::to_path_buf)
        .into_iter()
        .chain(std::iter::once(default_build))
        .collect();
    for root in &roots {
        let hit = WalkDir::new(root)
            .max_depth(SEARCH_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .find(|e| e.file_type().is_file() && e.file_name() == ARTIFACT_NAME);
        if let Some(entry) = hit {
            tracing::info!(path = %entry.path().display(), "artifact found by search");
            return Ok(entry.into_path());
        }
    }

    Err(PipelineError::ArtifactNotFound {
        name: ARTIFACT_NAME.to_string(),
        searched: roots,
    })
}

/// Locate the artifact and copy it into the canonical output tree.
pub fn resolve(
    android_dir: &Path,
    build_dir_override: Option<&Path>,
    name: &str,
    output_root: &Path,
) -> Result<Artifact> {
    let source = locate(android_dir, build_dir_override)?;
    let dest = output_root
        .join(name)
        .join(format!("{}.{}", name, ARTIFACT_EXT));

    copy_file(&source, &dest)?;
    let (sha256, size) = sha256_file(&dest)?;
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    write_file(
        &dest.with_extension(format!("{}.sha256", ARTIFACT_EXT)),
        format!("{}  {}\n", sha256, file_name),
    )?;

    Ok(Artifact {
        source,
        path: dest,
        size,
        sha256,
    })
}

/// Write one token per line next to the published artifact.
pub fn publish_keys(output_root: &Path, name: &str, tokens: &[String]) -> Result<Option<PathBuf>> {
    if tokens.is_empty() {
        return Ok(None);
    }
    let path = output_root.join(name).join(KEYS_FILE);
    write_file(&path, tokens.join("\n") + "\n")?;
    Ok(Some(path))
}
