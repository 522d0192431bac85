//! One build per package at a time, and one run per shared project tree.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Lock name guarding the shared native project and web bundle. Normalized
/// package names never contain `-`, so it cannot collide with one.
pub const PROJECT_LOCK: &str = "shared-project";

/// Exclusive hold on a package's build. Released on drop.
#[derive(Debug)]
pub struct BuildLock {
    _file: File,
    path: PathBuf,
}

impl BuildLock {
    /// Take the lock for `name` under `lock_dir`, or fail with
    /// [`PipelineError::BuildInProgress`] if someone else holds it.
    pub fn acquire(lock_dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(lock_dir)
            .with_context(|| format!("Failed to create lock dir: {}", lock_dir.display()))?;
        let path = lock_dir.join(format!("{}.lock", name));

        // Never unlink the lock file: a second process could then lock a
        // fresh inode at the same path while the first still holds the old one.
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to create lock file: {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            return Err(PipelineError::BuildInProgress(name.to_string()).into());
        }
        Ok(Self { _file: file, path })
    }

    /// Take the lock on the shared project tree.
    pub fn acquire_project(lock_dir: &Path) -> Result<Self> {
        Self::acquire(lock_dir, PROJECT_LOCK)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
