//! Content requests and asset pairing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::naming::{normalize_name, AppIdentity};

/// Path appended to the backend URL when the caller left it off.
pub const ACTIVATION_ENDPOINT: &str = "/activar";

/// An image and/or model sharing a normalized base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPair {
    pub base: String,
    pub image: Option<PathBuf>,
    pub model: Option<PathBuf>,
}

impl AssetPair {
    pub fn is_complete(&self) -> bool {
        self.image.is_some() && self.model.is_some()
    }
}

/// Derive the normalized base name of an asset from its file stem.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| normalize_name(&stem.to_string_lossy()))
        .unwrap_or_default()
}

/// Match images and models by normalized base name.
///
/// Every image starts its own pair. A model joins the first pair with the
/// same base that has no model yet; otherwise it is kept as a model-only pair.
pub fn pair_assets(images: &[PathBuf], models: &[PathBuf]) -> Vec<AssetPair> {
    let mut pairs: Vec<AssetPair> = images
        .iter()
        .map(|img| AssetPair {
            base: base_name(img),
            image: Some(img.clone()),
            model: None,
        })
        .collect();

    for model in models {
        let base = base_name(model);
        match pairs
            .iter_mut()
            .find(|p| p.base == base && p.model.is_none())
        {
            Some(pair) => pair.model = Some(model.clone()),
            None => pairs.push(AssetPair {
                base,
                image: None,
                model: Some(model.clone()),
            }),
        }
    }

    pairs
}

/// Raw input as collected from the user.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestDraft {
    pub name: String,
    pub backend_url: String,
    pub cover: PathBuf,
    #[serde(default)]
    pub images: Vec<PathBuf>,
    #[serde(default)]
    pub models: Vec<PathBuf>,
    pub key_count: u32,
}

/// A validated, immutable packaging request.
#[derive(Debug, Clone)]
pub struct ContentRequest {
    identity: AppIdentity,
    activation_url: String,
    cover: PathBuf,
    pairs: Vec<AssetPair>,
    key_count: u32,
}

impl ContentRequest {
    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn activation_url(&self) -> &str {
        &self.activation_url
    }

    pub fn cover(&self) -> &Path {
        &self.cover
    }

    pub fn pairs(&self) -> &[AssetPair] {
        &self.pairs
    }

    pub fn key_count(&self) -> u32 {
        self.key_count
    }

    /// Host part of the activation URL, for the network security config.
    pub fn backend_host(&self) -> Option<&str> {
        let rest = self.activation_url.strip_prefix("https://")?;
        let host = rest.split(['/', ':', '?']).next()?;
        (!host.is_empty()).then_some(host)
    }
}

impl RequestDraft {
    /// Check required fields and build the request.
    ///
    /// Individual asset files are not checked here; a pair whose files are
    /// missing is skipped during assembly.
    pub fn validate(self, app_id_prefix: &str) -> Result<ContentRequest, PipelineError> {
        let identity = AppIdentity::new(&self.name, app_id_prefix)?;

        let url = self.backend_url.trim();
        if !url.starts_with("https://") {
            return Err(PipelineError::Validation(format!(
                "backend URL must start with https:// (got '{}')",
                url
            )));
        }
        let url = url.trim_end_matches('/');
        let activation_url = if url.ends_with(ACTIVATION_ENDPOINT) {
            url.to_string()
        } else {
            format!("{}{}", url, ACTIVATION_ENDPOINT)
        };

        if self.key_count == 0 {
            return Err(PipelineError::Validation(
                "key count must be at least 1".into(),
            ));
        }
        if !self.cover.is_file() {
            return Err(PipelineError::Validation(format!(
                "cover image '{}' does not exist",
                self.cover.display()
            )));
        }

        let pairs = pair_assets(&self.images, &self.models);
        if !pairs.iter().any(AssetPair::is_complete) {
            return Err(PipelineError::Validation(
                "at least one image/model pair is required".into(),
            ));
        }

        // Pair outputs are named by base, so two complete pairs sharing one
        // would overwrite each other's files and registry entry.
        let mut seen = HashSet::new();
        for pair in pairs.iter().filter(|p| p.is_complete()) {
            if !seen.insert(pair.base.as_str()) {
                return Err(PipelineError::Validation(format!(
                    "more than one image/model pair normalizes to '{}'",
                    pair.base
                )));
            }
        }

        Ok(ContentRequest {
            identity,
            activation_url,
            cover: self.cover,
            pairs,
            key_count: self.key_count,
        })
    }
}
