//! Content assembly.
//!
//! Builds two trees from a validated [`ContentRequest`]:
//!
//! ```text
//! <packages_root>/<name>/          <web_bundle_root>/
//!   portada.jpg                      portada.jpg
//!   images/<base>.<ext>              images/<base>.<ext>
//!   models/<base>.glb                models/<base>.glb
//!   patterns/<base>.patt             patterns/<base>.patt
//!   *.html                           assets/markers/<base>.{fset,fset3,iset}
//!                                    data/{model_props.json, ar_content.js, camera_para.dat}
//!                                    *.html, js/frontend-ar.js
//! ```
//!
//! Both trees are wiped first. Pairs that fail are skipped and reported;
//! the assembly only fails as a whole when no pair survives.
//!
//! # Example
//!
//! ```rust,ignore
//! let assembler = Assembler::new(&config, &SystemRunner, &store);
//! let manifest = assembler.assemble(&request)?;
//! println!("{} markers, {} keys", manifest.entries.len(), manifest.tokens.len());
//! ```

mod bundle;
pub mod pages;

pub use bundle::{MarkerEntry, MarkerKind};

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::activation::{issue_tokens, ActivationStore};
use crate::config::PackagerConfig;
use crate::convert::ModelConverter;
use crate::error::PipelineError;
use crate::fsutil::{copy_file, reset_dir, write_file};
use crate::marker::{self, DescriptorTool};
use crate::process::CommandRunner;
use crate::request::{AssetPair, ContentRequest};

pub const COVER_FILE: &str = "portada.jpg";
const COVER_QUALITY: u8 = 95;

/// A pair left out of the package, and why.
#[derive(Debug, Clone)]
pub struct SkippedPair {
    pub base: String,
    pub reason: String,
}

/// Result of a successful assembly.
#[derive(Debug, Clone)]
pub struct PackageManifest {
    pub name: String,
    pub package_dir: PathBuf,
    pub bundle_dir: PathBuf,
    pub entries: Vec<MarkerEntry>,
    pub skipped: Vec<SkippedPair>,
    pub tokens: Vec<String>,
}

pub struct Assembler<'a> {
    config: &'a PackagerConfig,
    runner: &'a dyn CommandRunner,
    store: &'a dyn ActivationStore,
}

impl<'a> Assembler<'a> {
    pub fn new(
        config: &'a PackagerConfig,
        runner: &'a dyn CommandRunner,
        store: &'a dyn ActivationStore,
    ) -> Self {
        Self {
            config,
            runner,
            store,
        }
    }

    pub fn assemble(&self, request: &ContentRequest) -> Result<PackageManifest> {
        let name = request.name();
        let package_dir = self.config.package_dir(name);
        let bundle_dir = self.config.web_bundle_root.clone();

        reset_dir(&package_dir)?;
        reset_dir(&bundle_dir)?;
        tracing::info!(package = name, dir = %package_dir.display(), "assembling package");

        write_cover(request.cover(), &[&package_dir, &bundle_dir])?;

        let descriptor_tool = self
            .config
            .descriptor_tool
            .as_ref()
            .map(|cfg| DescriptorTool::new(cfg, self.runner))
            .filter(|tool| {
                let ok = tool.is_available();
                if !ok {
                    tracing::warn!("descriptor tool unavailable; using pattern markers only");
                }
                ok
            });
        let converter = ModelConverter::new(
            &self.config.converter,
            self.runner,
            self.config.output_root.join(".scratch"),
        );

        let mut entries = Vec::new();
        let mut skipped = Vec::new();
        for pair in request.pairs().iter().filter(|p| p.is_complete()) {
            let result = self.process_pair(
                pair,
                &package_dir,
                &bundle_dir,
                &converter,
                descriptor_tool.as_ref(),
            );
            match result {
                Ok(entry) => {
                    tracing::info!(pair = %pair.base, kind = ?entry.kind, "pair packaged");
                    entries.push(entry);
                }
                Err(e) => {
                    tracing::error!(pair = %pair.base, error = %format!("{:#}", e), "pair skipped");
                    skipped.push(SkippedPair {
                        base: pair.base.clone(),
                        reason: format!("{:#}", e),
                    });
                }
            }
        }
        if entries.is_empty() {
            return Err(PipelineError::NoUsablePairs {
                failed: skipped.len(),
            }
            .into());
        }

        bundle::write_bundle(
            &bundle_dir,
            name,
            request.activation_url(),
            &entries,
            self.config.camera_params.as_deref(),
        )?;
        bundle::copy_pages(&bundle_dir, &package_dir)?;

        let tokens = issue_tokens(self.store, request.key_count())?;
        let keys_file = self.config.output_root.join(format!("{}_claves.txt", name));
        write_file(&keys_file, tokens.join("\n"))?;
        tracing::info!(count = tokens.len(), file = %keys_file.display(), "activation keys issued");

        Ok(PackageManifest {
            name: name.to_string(),
            package_dir,
            bundle_dir,
            entries,
            skipped,
            tokens,
        })
    }

    fn process_pair(
        &self,
        pair: &AssetPair,
        package_dir: &Path,
        bundle_dir: &Path,
        converter: &ModelConverter<'_>,
        descriptor_tool: Option<&DescriptorTool<'_>>,
    ) -> Result<MarkerEntry> {
        let (Some(image), Some(model)) = (&pair.image, &pair.model) else {
            anyhow::bail!("pair '{}' is incomplete", pair.base);
        };
        let base = pair.base.as_str();

        // Decode before touching the trees so a bad image leaves nothing behind.
        let pattern = marker::encode(image)?;

        let bundle_model = bundle_dir.join("models").join(format!("{}.glb", base));
        converter.place(model, &bundle_model)?;
        copy_file(
            &bundle_model,
            &package_dir.join("models").join(format!("{}.glb", base)),
        )?;

        let mut entry = MarkerEntry::pattern(base);
        if let Some(tool) = descriptor_tool {
            let markers_dir = bundle_dir.join("assets").join("markers");
            match tool.generate(image, &markers_dir, base) {
                Ok(n) if n > 0 => entry = entry.with_descriptor(base),
                Ok(_) => tracing::warn!(pair = base, "descriptor tool produced no files"),
                Err(e) => tracing::warn!(pair = base, error = %format!("{:#}", e), "descriptor tool failed"),
            }
        }

        for root in [bundle_dir, package_dir] {
            let patterns = root.join("patterns");
            fs::create_dir_all(&patterns)
                .with_context(|| format!("Failed to create {}", patterns.display()))?;
            pattern.write_to(&patterns.join(format!("{}.patt", base)))?;
        }

        let ext = image
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_else(|| "jpg".to_string());
        let image_name = format!("{}.{}", base, ext);
        for root in [package_dir, bundle_dir] {
            copy_file(image, &root.join("images").join(&image_name))?;
        }

        Ok(entry)
    }
}

/// Re-encode the cover as RGB JPEG into each destination directory.
fn write_cover(src: &Path, dest_dirs: &[&Path]) -> Result<()> {
    let img = image::open(src).map_err(|e| PipelineError::Io {
        path: src.to_path_buf(),
        reason: e.to_string(),
    })?;
    let rgb = img.to_rgb8();
    for dir in dest_dirs {
        let path = dir.join(COVER_FILE);
        let file =
            File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        JpegEncoder::new_with_quality(BufWriter::new(file), COVER_QUALITY)
            .encode_image(&rgb)
            .with_context(|| format!("encoding cover '{}'", path.display()))?;
    }
    Ok(())
}
