//! Web bundle data files and pages.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

use super::pages;
use crate::fsutil::{copy_file, write_file};

/// One tracked marker and the model it anchors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerEntry {
    #[serde(rename = "type")]
    pub kind: MarkerKind,
    pub marker_url: String,
    pub model_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Pattern,
    Nft,
}

impl MarkerEntry {
    pub fn pattern(base: &str) -> Self {
        Self {
            kind: MarkerKind::Pattern,
            marker_url: format!("patterns/{}.patt", base),
            model_url: format!("models/{}.glb", base),
            descriptor_url: None,
        }
    }

    /// Upgrade to a natural-feature marker; the pattern stays as fallback.
    pub fn with_descriptor(mut self, base: &str) -> Self {
        self.kind = MarkerKind::Nft;
        self.descriptor_url = Some(format!("assets/markers/{}", base));
        self
    }
}

/// Write `data/`, the pages, and the frontend script into `bundle`.
pub fn write_bundle(
    bundle: &Path,
    name: &str,
    activation_url: &str,
    entries: &[MarkerEntry],
    camera_params: Option<&Path>,
) -> Result<()> {
    let content = serde_json::to_value(entries).context("serializing marker entries")?;
    let data = bundle.join("data");

    write_file(
        &data.join("model_props.json"),
        serde_json::to_string_pretty(&content)?,
    )?;
    write_file(
        &data.join("ar_content.js"),
        format!("const MODELS = {};", pages::script_json(&content)),
    )?;

    match camera_params {
        Some(src) if src.is_file() => {
            copy_file(src, &data.join("camera_para.dat"))?;
        }
        Some(src) => tracing::warn!(
            path = %src.display(),
            "camera parameters file not found; tracker will use its built-in default"
        ),
        None => tracing::debug!("no camera parameters configured"),
    }

    write_file(
        &bundle.join(pages::INDEX_HTML),
        pages::index_html(name, activation_url),
    )?;
    write_file(
        &bundle.join(pages::MAIN_MENU_HTML),
        pages::main_menu_html(name),
    )?;
    write_file(
        &bundle.join(pages::AR_VIEWER_HTML),
        pages::ar_viewer_html(name, &content),
    )?;
    write_file(
        &bundle.join(pages::WEB_AR_VIEWER_HTML),
        pages::web_ar_viewer_html(name),
    )?;
    write_file(&bundle.join(pages::FRONTEND_JS), pages::frontend_js())?;
    Ok(())
}

/// Mirror the generated pages into the package directory.
pub fn copy_pages(bundle: &Path, package: &Path) -> Result<()> {
    for page in pages::PAGES {
        fs::copy(bundle.join(page), package.join(page))
            .with_context(|| format!("Failed to copy {} into {}", page, package.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entry_json_shape() {
        let json = serde_json::to_value(MarkerEntry::pattern("gato")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "pattern",
                "markerUrl": "patterns/gato.patt",
                "modelUrl": "models/gato.glb"
            })
        );
        let nft = serde_json::to_value(MarkerEntry::pattern("gato").with_descriptor("gato")).unwrap();
        assert_eq!(nft["type"], "nft");
        assert_eq!(nft["descriptorUrl"], "assets/markers/gato");
        assert_eq!(nft["markerUrl"], "patterns/gato.patt");
    }

    #[test]
    fn test_write_bundle_files() {
        let tmp = TempDir::new().unwrap();
        let bundle = tmp.path().join("www");
        let cam = tmp.path().join("camera_para.dat");
        fs::write(&cam, b"params").unwrap();
        let entries = vec![MarkerEntry::pattern("a"), MarkerEntry::pattern("b")];

        write_bundle(&bundle, "libro", "https://x.org/activar", &entries, Some(&cam)).unwrap();

        let js = fs::read_to_string(bundle.join("data/ar_content.js")).unwrap();
        assert!(js.starts_with("const MODELS = [{"));
        assert!(js.ends_with("];"));
        let props: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(bundle.join("data/model_props.json")).unwrap())
                .unwrap();
        assert_eq!(props.as_array().unwrap().len(), 2);
        assert!(bundle.join("data/camera_para.dat").is_file());
        assert!(fs::read_to_string(bundle.join("ar-viewer.html"))
            .unwrap()
            .contains("window.arContent = [{"));
        for page in pages::PAGES {
            assert!(bundle.join(page).is_file(), "{page} missing");
        }
        assert!(bundle.join("js/frontend-ar.js").is_file());
    }
}
