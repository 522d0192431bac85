//! Free-space checks for the build volumes.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::StorageProfile;
use crate::fsutil::dir_size;

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// Reports free bytes on the volume holding a path.
pub trait SpaceProbe: Send + Sync {
    fn available(&self, path: &Path) -> Result<u64>;
}

/// Host probe backed by `statvfs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fs2Probe;

impl SpaceProbe for Fs2Probe {
    fn available(&self, path: &Path) -> Result<u64> {
        // The cache may not exist yet; measure its nearest existing ancestor.
        let existing = path
            .ancestors()
            .find(|p| p.exists())
            .unwrap_or_else(|| Path::new("/"));
        fs2::available_space(existing)
            .with_context(|| format!("querying free space at {}", existing.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Headroom {
    Ample(u64),
    Low(u64),
    Critical(u64),
    /// No volume could be measured.
    Unknown,
}

/// Smallest free space across `paths`, graded against the profile.
pub fn check_headroom(probe: &dyn SpaceProbe, profile: &StorageProfile, paths: &[&Path]) -> Headroom {
    let free = paths
        .iter()
        .filter_map(|p| match probe.available(p) {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::warn!(path = %p.display(), error = %e, "could not measure free space");
                None
            }
        })
        .min();
    match free {
        None => Headroom::Unknown,
        Some(n) if n < profile.critical_bytes() => Headroom::Critical(n),
        Some(n) if n < profile.warning_bytes() => Headroom::Low(n),
        Some(n) => Headroom::Ample(n),
    }
}

/// Log what is occupying space on the build volumes.
pub fn log_space_diagnostic(labelled: &[(&str, PathBuf)]) {
    for (label, path) in labelled {
        let size = dir_size(path) as f64;
        tracing::info!(
            what = label,
            path = %path.display(),
            size_mb = %format!("{:.1}", size / MIB),
            "space usage"
        );
    }
}

pub fn format_gib(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / GIB)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Fixed(HashMap<PathBuf, u64>);

    impl SpaceProbe for Fixed {
        fn available(&self, path: &Path) -> Result<u64> {
            self.0
                .get(path)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("unmounted"))
        }
    }

    fn profile() -> StorageProfile {
        StorageProfile {
            primary_cache: PathBuf::from("/cache"),
            relocated_root: PathBuf::from("/alt"),
            critical_free_gb: 4,
            warning_free_gb: 8,
        }
    }

    const GB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_minimum_across_volumes_decides() {
        let probe = Fixed(HashMap::from([
            (PathBuf::from("/cache"), 50 * GB),
            (PathBuf::from("/project"), 3 * GB),
        ]));
        let h = check_headroom(&probe, &profile(), &[Path::new("/cache"), Path::new("/project")]);
        assert_eq!(h, Headroom::Critical(3 * GB));
    }

    #[test]
    fn test_grades() {
        let p = profile();
        let one = |n| Fixed(HashMap::from([(PathBuf::from("/cache"), n)]));
        assert_eq!(check_headroom(&one(6 * GB), &p, &[Path::new("/cache")]), Headroom::Low(6 * GB));
        assert_eq!(check_headroom(&one(9 * GB), &p, &[Path::new("/cache")]), Headroom::Ample(9 * GB));
        assert_eq!(check_headroom(&one(9 * GB), &p, &[Path::new("/nope")]), Headroom::Unknown);
    }

    #[test]
    fn test_fs2_probe_handles_missing_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let n = Fs2Probe.available(&tmp.path().join("not/yet/created")).unwrap();
        assert!(n > 0);
    }
}
