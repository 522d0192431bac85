//! Child-process environment for a build strategy.
//!
//! A [`BuildEnvironment`] is applied to each [`CommandSpec`] it launches.
//! The host process environment is never modified.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::StorageProfile;
use crate::process::CommandSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Standard cache and temp locations.
    Primary,
    /// Everything redirected under the profile's relocated root.
    Relocated,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Primary => "primary",
            Strategy::Relocated => "relocated",
        })
    }
}

#[derive(Debug, Clone)]
pub struct BuildEnvironment {
    strategy: Strategy,
    gradle_home: PathBuf,
    build_dir: Option<PathBuf>,
    dirs: Vec<PathBuf>,
    vars: Vec<(String, OsString)>,
}

/// Scratch directory the relocated strategy points every temp variable at.
pub fn relocated_temp(profile: &StorageProfile) -> PathBuf {
    profile.relocated_root.join("temp")
}

impl BuildEnvironment {
    pub fn primary(profile: &StorageProfile) -> Self {
        Self {
            strategy: Strategy::Primary,
            gradle_home: profile.primary_cache.clone(),
            build_dir: None,
            dirs: Vec::new(),
            vars: vec![(
                "GRADLE_USER_HOME".into(),
                profile.primary_cache.clone().into_os_string(),
            )],
        }
    }

    /// Redirect caches, temp dirs, and build output for package `name`.
    pub fn relocated(profile: &StorageProfile, name: &str) -> Self {
        let root = &profile.relocated_root;
        let gradle = root.join("gradle");
        let temp = relocated_temp(profile);
        let npm_prefix = root.join("npm");
        let npm_cache = root.join("npm-cache");
        let build_dir = root.join("build").join(name);

        let mut java_opts = OsString::from("-Djava.io.tmpdir=");
        java_opts.push(&temp);

        let vars = vec![
            ("GRADLE_USER_HOME".to_string(), gradle.clone().into_os_string()),
            ("JAVA_OPTS".to_string(), java_opts),
            ("TEMP".to_string(), temp.clone().into_os_string()),
            ("TMP".to_string(), temp.clone().into_os_string()),
            ("TMPDIR".to_string(), temp.clone().into_os_string()),
            ("npm_config_prefix".to_string(), npm_prefix.clone().into_os_string()),
            ("npm_config_cache".to_string(), npm_cache.clone().into_os_string()),
            ("ANDROID_BUILD_DIR".to_string(), build_dir.clone().into_os_string()),
        ];

        Self {
            strategy: Strategy::Relocated,
            gradle_home: gradle.clone(),
            build_dir: Some(build_dir.clone()),
            dirs: vec![gradle, temp, npm_prefix, npm_cache, build_dir],
            vars,
        }
    }

    pub fn for_strategy(strategy: Strategy, profile: &StorageProfile, name: &str) -> Self {
        match strategy {
            Strategy::Primary => Self::primary(profile),
            Strategy::Relocated => Self::relocated(profile, name),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn gradle_home(&self) -> &Path {
        &self.gradle_home
    }

    /// Build output override; `None` keeps the project default.
    pub fn build_dir(&self) -> Option<&Path> {
        self.build_dir.as_deref()
    }

    pub fn vars(&self) -> &[(String, OsString)] {
        &self.vars
    }

    /// Create every directory the variables point at.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in &self.dirs {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create build directory: {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn apply(&self, spec: CommandSpec) -> CommandSpec {
        self.vars
            .iter()
            .fold(spec, |spec, (key, value)| spec.env(key.clone(), value.clone()))
    }
}
