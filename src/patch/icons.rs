//! Launcher icons generated from the package cover.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::fs;
use std::path::Path;

use crate::error::PipelineError;

const RES_DIR: &str = "app/src/main/res";

/// Density bucket and square icon size in pixels.
pub const DENSITIES: &[(&str, u32)] = &[
    ("mipmap-mdpi", 48),
    ("mipmap-hdpi", 72),
    ("mipmap-xhdpi", 96),
    ("mipmap-xxhdpi", 144),
    ("mipmap-xxxhdpi", 192),
];

const ADAPTIVE_DIR: &str = "mipmap-anydpi-v26";

/// Replace every launcher icon under `android_dir` with square and round
/// renditions of `cover`.
///
/// Any icon file left by the template in a `mipmap-*` directory is removed
/// first, including adaptive foregrounds and the `anydpi-v26` XML, so the
/// launcher can only pick up the generated bitmaps.
pub fn write_launcher_icons(android_dir: &Path, cover: &Path) -> Result<()> {
    let img = image::open(cover).map_err(|e| PipelineError::Io {
        path: cover.to_path_buf(),
        reason: e.to_string(),
    })?;
    let res = android_dir.join(RES_DIR);
    clear_template_icons(&res)?;

    for (bucket, size) in DENSITIES {
        let dir = res.join(bucket);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let square = fit_square(&img, *size);
        save_png(&square, &dir.join("ic_launcher.png"))?;
        save_png(&round_mask(square), &dir.join("ic_launcher_round.png"))?;
    }
    tracing::info!(cover = %cover.display(), "launcher icons generated");
    Ok(())
}

fn clear_template_icons(res: &Path) -> Result<()> {
    let adaptive = res.join(ADAPTIVE_DIR);
    if adaptive.is_dir() {
        fs::remove_dir_all(&adaptive)
            .with_context(|| format!("removing '{}'", adaptive.display()))?;
    }
    let Ok(entries) = fs::read_dir(res) else {
        return Ok(());
    };
    for entry in entries.filter_map(Result::ok) {
        let dir = entry.path();
        if !dir.is_dir() || !entry.file_name().to_string_lossy().starts_with("mipmap-") {
            continue;
        }
        for file in fs::read_dir(&dir)
            .with_context(|| format!("reading '{}'", dir.display()))?
            .filter_map(Result::ok)
        {
            let path = file.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "png" || e == "xml") {
                fs::remove_file(&path)
                    .with_context(|| format!("removing '{}'", path.display()))?;
                tracing::debug!(file = %path.display(), "removed template icon");
            }
        }
    }
    Ok(())
}

/// Center-crop to a square and scale to `size`.
fn fit_square(img: &DynamicImage, size: u32) -> RgbaImage {
    img.resize_to_fill(size, size, FilterType::Lanczos3).to_rgba8()
}

/// Clear alpha outside the inscribed circle.
fn round_mask(mut img: RgbaImage) -> RgbaImage {
    let r = img.width() as f32 / 2.0;
    for (x, y, px) in img.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - r;
        let dy = y as f32 + 0.5 - r;
        if dx * dx + dy * dy > r * r {
            px.0[3] = 0;
        }
    }
    img
}

fn save_png(img: &RgbaImage, path: &Path) -> Result<()> {
    img.save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("writing icon '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn cover(tmp: &TempDir) -> std::path::PathBuf {
        let path = tmp.path().join("portada.jpg");
        RgbImage::from_pixel(300, 200, Rgb([200, 30, 30]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_icons_written_at_every_density() {
        let tmp = TempDir::new().unwrap();
        let android = tmp.path().join("android");
        write_launcher_icons(&android, &cover(&tmp)).unwrap();

        let res = android.join(RES_DIR);
        for (bucket, size) in DENSITIES {
            for name in ["ic_launcher.png", "ic_launcher_round.png"] {
                let icon = image::open(res.join(bucket).join(name)).unwrap();
                assert_eq!((icon.width(), icon.height()), (*size, *size), "{}/{}", bucket, name);
            }
        }
    }

    #[test]
    fn test_round_icon_is_transparent_outside_circle() {
        let tmp = TempDir::new().unwrap();
        let android = tmp.path().join("android");
        write_launcher_icons(&android, &cover(&tmp)).unwrap();

        let dir = android.join(RES_DIR).join("mipmap-mdpi");
        let round = image::open(dir.join("ic_launcher_round.png")).unwrap().to_rgba8();
        assert_eq!(round.get_pixel(0, 0).0[3], 0);
        assert_eq!(round.get_pixel(47, 47).0[3], 0);
        assert_eq!(round.get_pixel(24, 24).0[3], 255);

        let square = image::open(dir.join("ic_launcher.png")).unwrap().to_rgba8();
        assert_eq!(square.get_pixel(0, 0).0[3], 255);
    }

    #[test]
    fn test_template_adaptive_icons_removed() {
        let tmp = TempDir::new().unwrap();
        let android = tmp.path().join("android");
        let res = android.join(RES_DIR);
        fs::create_dir_all(res.join("mipmap-hdpi")).unwrap();
        fs::create_dir_all(res.join(ADAPTIVE_DIR)).unwrap();
        fs::create_dir_all(res.join("values")).unwrap();
        fs::write(res.join("mipmap-hdpi/ic_launcher_foreground.png"), b"old").unwrap();
        fs::write(res.join(ADAPTIVE_DIR).join("ic_launcher.xml"), "<adaptive-icon/>").unwrap();
        fs::write(res.join("values/ic_launcher_background.xml"), "<resources/>").unwrap();

        write_launcher_icons(&android, &cover(&tmp)).unwrap();

        assert!(!res.join("mipmap-hdpi/ic_launcher_foreground.png").exists());
        assert!(!res.join(ADAPTIVE_DIR).exists());
        assert!(res.join("mipmap-hdpi/ic_launcher.png").is_file());
        // non-mipmap resources are left alone
        assert!(res.join("values/ic_launcher_background.xml").is_file());
    }

    #[test]
    fn test_unreadable_cover_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let bad = tmp.path().join("portada.jpg");
        fs::write(&bad, b"not an image").unwrap();
        let err = write_launcher_icons(&tmp.path().join("android"), &bad).unwrap_err();
        assert!(matches!(PipelineError::find(&err), Some(PipelineError::Io { .. })));
    }
}
