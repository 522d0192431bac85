//! Marker pattern codec.
//!
//! Turns an image into the 16×16 grayscale grid consumed by the marker
//! tracker. The grid is written three times, one block per orientation the
//! tracker compares against, with a blank line between blocks:
//!
//! ```text
//! 255 255 254 ...   (16 values, each right-aligned to width 3)
//! ...               (16 rows)
//!
//! 255 255 254 ...   (second block)
//! ```
//!
//! Encoding is a pure function of the decoded pixels.

use anyhow::{Context, Result};
use image::DynamicImage;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::PipelineError;

pub const GRID_SIZE: usize = 16;
pub const PATTERN_BLOCKS: usize = 3;

/// One encoded marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    cells: [[u8; GRID_SIZE]; GRID_SIZE],
}

/// Decode `image_path` and encode it.
///
/// An unreadable or undecodable file is reported as [`PipelineError::Io`].
pub fn encode(image_path: &Path) -> Result<Pattern, PipelineError> {
    let img = image::open(image_path).map_err(|e| PipelineError::Io {
        path: image_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(Pattern::from_image(&img))
}

impl Pattern {
    pub fn from_image(img: &DynamicImage) -> Self {
        let rgb = img.to_rgb8();
        let (w, h) = rgb.dimensions();
        let gray: Vec<u8> = rgb.pixels().map(|p| luma(p.0)).collect();
        Self {
            cells: area_resize(&gray, w as usize, h as usize),
        }
    }

    pub fn cells(&self) -> &[[u8; GRID_SIZE]; GRID_SIZE] {
        &self.cells
    }

    /// Text form: three identical blocks, no trailing whitespace.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(PATTERN_BLOCKS * GRID_SIZE * GRID_SIZE * 4 + 8);
        for _ in 0..PATTERN_BLOCKS {
            for row in &self.cells {
                for (i, value) in row.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    let _ = write!(out, "{:3}", value);
                }
                out.push('\n');
            }
            out.push('\n');
        }
        out.truncate(out.trim_end().len());
        out
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())
            .with_context(|| format!("Failed to write pattern: {}", path.display()))
    }
}

// ITU-R BT.601 luma in 14-bit fixed point.
fn luma([r, g, b]: [u8; 3]) -> u8 {
    let y = (r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + (1 << 13)) >> 14;
    y.min(255) as u8
}

/// Source weights of each output cell along one axis.
///
/// Area mode: output cell `o` covers source span `[o * scale, (o + 1) * scale)`
/// and each source pixel contributes the length of its overlap with it.
///
/// Linear mode: the cell center maps to `(o + 0.5) * scale - 0.5`, clamped to
/// the source, and the two neighbouring pixels are weighted by distance.
fn axis_weights(src_len: usize, linear: bool) -> Vec<Vec<(usize, f64)>> {
    let scale = src_len as f64 / GRID_SIZE as f64;
    (0..GRID_SIZE)
        .map(|o| {
            if linear {
                let max = (src_len - 1) as f64;
                let x = ((o as f64 + 0.5) * scale - 0.5).clamp(0.0, max);
                let i0 = x.floor() as usize;
                let i1 = (i0 + 1).min(src_len - 1);
                let frac = x - i0 as f64;
                return if frac > 0.0 && i1 != i0 {
                    vec![(i0, 1.0 - frac), (i1, frac)]
                } else {
                    vec![(i0, 1.0)]
                };
            }
            let start = o as f64 * scale;
            let end = start + scale;
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_len);
            (first..last)
                .filter_map(|i| {
                    let lo = start.max(i as f64);
                    let hi = end.min(i as f64 + 1.0);
                    (hi > lo).then_some((i, hi - lo))
                })
                .collect()
        })
        .collect()
}

/// Resize to the grid size.
///
/// Area averaging when both sides are at least the grid size; a source
/// smaller than the grid on either side is interpolated bilinearly on both
/// axes instead, so small markers upscale smoothly.
fn area_resize(gray: &[u8], width: usize, height: usize) -> [[u8; GRID_SIZE]; GRID_SIZE] {
    let mut cells = [[0u8; GRID_SIZE]; GRID_SIZE];
    if width == 0 || height == 0 {
        return cells;
    }
    let linear = width < GRID_SIZE || height < GRID_SIZE;
    let xs = axis_weights(width, linear);
    let ys = axis_weights(height, linear);

    for (oy, row_weights) in ys.iter().enumerate() {
        for (ox, col_weights) in xs.iter().enumerate() {
            let mut sum = 0.0;
            let mut area = 0.0;
            for &(y, wy) in row_weights {
                let row = &gray[y * width..(y + 1) * width];
                for &(x, wx) in col_weights {
                    let w = wx * wy;
                    sum += row[x] as f64 * w;
                    area += w;
                }
            }
            if area > 0.0 {
                cells[oy][ox] = (sum / area).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    cells
}
