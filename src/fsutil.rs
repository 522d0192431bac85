//! Filesystem helpers shared by the assembler, patcher, and resolver.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use walkdir::WalkDir;

/// Delete `dir` if present and recreate it empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("Failed to remove directory: {}", dir.display()))?;
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))
}

/// Mirror the tree under `src` into `dst`. Symlinks are recreated, not
/// followed; existing files in `dst` are overwritten.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.with_context(|| format!("walking '{}'", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("'{}' escaped '{}'", entry.path().display(), src.display()))?;
        let target = dst.join(rel);
        let kind = entry.file_type();

        if kind.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("creating '{}'", target.display()))?;
        } else if kind.is_symlink() {
            let link = fs::read_link(entry.path())
                .with_context(|| format!("reading link '{}'", entry.path().display()))?;
            if target.symlink_metadata().is_ok() {
                fs::remove_file(&target)
                    .with_context(|| format!("replacing '{}'", target.display()))?;
            }
            #[cfg(unix)]
            std::os::unix::fs::symlink(&link, &target)
                .with_context(|| format!("linking '{}' -> '{}'", target.display(), link.display()))?;
            #[cfg(not(unix))]
            fs::copy(entry.path(), &target)
                .with_context(|| format!("copying link target '{}'", link.display()))?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("copying '{}' to '{}'", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}

/// Copy a single file, creating the destination's parent.
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))
}

/// Move a file into place. Crossing filesystems degrades to copy then
/// unlink, which is not atomic.
pub fn atomic_move(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating '{}'", parent.display()))?;
    }
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    copy_file(src, dst)?;
    fs::remove_file(src).with_context(|| format!("removing moved file '{}'", src.display()))
}

/// Write `contents`, creating parent directories.
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

/// Total size of regular files under `root`; zero when it does not exist.
pub fn dir_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Hex SHA-256 and byte length of a file.
pub fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let f = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut r = BufReader::new(f);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), size))
}
