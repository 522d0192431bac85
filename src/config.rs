//! Packager configuration.
//!
//! Loaded from a TOML file with every table optional. Missing values fall
//! back to locations under the user's data directory, so a bare
//! `PackagerConfig::default()` is usable for local runs.
//!
//! ```toml
//! output_root = "/srv/ar/output"
//! template_project = "/srv/ar/template/android"
//!
//! [storage]
//! relocated_root = "/mnt/scratch/ar-build"
//! critical_free_gb = 4
//!
//! [descriptor_tool]
//! dir = "/opt/nft-creator"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PackagerConfig {
    pub packages_root: PathBuf,
    pub web_bundle_root: PathBuf,
    pub output_root: PathBuf,
    pub template_project: PathBuf,
    /// Capacitor project holding `package.json`, `www/` and `android/`.
    pub project_root: PathBuf,
    pub datastore: PathBuf,
    pub camera_params: Option<PathBuf>,
    pub app_id_prefix: String,
    pub converter: ConverterConfig,
    pub descriptor_tool: Option<DescriptorToolConfig>,
    pub build: BuildPolicy,
    pub storage: StorageProfile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConverterConfig {
    pub program: PathBuf,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptorToolConfig {
    pub dir: PathBuf,
    #[serde(default = "default_node")]
    pub node: PathBuf,
    #[serde(default = "default_descriptor_timeout")]
    pub timeout_secs: u64,
}

/// Attempt caps, delays, and per-stage wall-clock limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BuildPolicy {
    pub max_attempts: u32,
    pub sync_retry_delay_secs: u64,
    pub compile_retry_delay_secs: u64,
    pub dependency_timeout_secs: u64,
    pub sync_timeout_secs: u64,
    pub compile_timeout_secs: u64,
}

/// Where build caches live, and when to move them.
///
/// The primary paths are used while headroom on their volumes stays above
/// `critical_free_gb`. Below that the executor redirects every cache, temp,
/// and output directory under `relocated_root`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StorageProfile {
    pub primary_cache: PathBuf,
    pub relocated_root: PathBuf,
    pub critical_free_gb: u64,
    pub warning_free_gb: u64,
}

fn default_node() -> PathBuf {
    PathBuf::from("node")
}

fn default_descriptor_timeout() -> u64 {
    180
}

fn data_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ar-packager")
}

impl Default for PackagerConfig {
    fn default() -> Self {
        let root = data_root();
        Self {
            packages_root: root.join("paquetes"),
            web_bundle_root: root.join("project").join("www"),
            output_root: root.join("output"),
            template_project: root.join("template").join("android"),
            project_root: root.join("project"),
            datastore: root.join("activaciones.db"),
            camera_params: None,
            app_id_prefix: "com.librosdar".to_string(),
            converter: ConverterConfig::default(),
            descriptor_tool: None,
            build: BuildPolicy::default(),
            storage: StorageProfile::default(),
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("blender"),
            timeout_secs: 300,
        }
    }
}

impl Default for BuildPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            sync_retry_delay_secs: 10,
            compile_retry_delay_secs: 15,
            dependency_timeout_secs: 600,
            sync_timeout_secs: 300,
            compile_timeout_secs: 1800,
        }
    }
}

impl BuildPolicy {
    pub fn sync_retry_delay(&self) -> Duration {
        Duration::from_secs(self.sync_retry_delay_secs)
    }

    pub fn compile_retry_delay(&self) -> Duration {
        Duration::from_secs(self.compile_retry_delay_secs)
    }
}

impl Default for StorageProfile {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            primary_cache: home.join(".gradle"),
            relocated_root: data_root().join("relocated"),
            critical_free_gb: 4,
            warning_free_gb: 8,
        }
    }
}

impl StorageProfile {
    pub fn critical_bytes(&self) -> u64 {
        self.critical_free_gb.saturating_mul(GIB)
    }

    pub fn warning_bytes(&self) -> u64 {
        self.warning_free_gb.saturating_mul(GIB)
    }
}

impl PackagerConfig {
    /// Read a config file, or return defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading packager config '{}'", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("parsing packager config '{}'", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.build.max_attempts == 0 {
            bail!(
                "invalid packager config '{}': build.max_attempts must be at least 1",
                path.display()
            );
        }
        if self.storage.warning_free_gb < self.storage.critical_free_gb {
            bail!(
                "invalid packager config '{}': storage.warning_free_gb ({}) is below critical_free_gb ({})",
                path.display(),
                self.storage.warning_free_gb,
                self.storage.critical_free_gb
            );
        }
        Ok(())
    }

    /// Package directory for a normalized name.
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.packages_root.join(name)
    }

    /// Native Android project inside the Capacitor project.
    pub fn android_dir(&self) -> PathBuf {
        self.project_root.join("android")
    }

    /// Canonical output directory for a normalized name.
    pub fn output_dir(&self, name: &str) -> PathBuf {
        self.output_root.join(name)
    }
}
