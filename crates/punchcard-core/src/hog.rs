//! Orientation-histogram descriptor extraction.
//!
//! Turns a face region into a fixed-length gradient-histogram descriptor:
//! bilinear resize to a fixed square, centered gradients, unsigned
//! orientation binning over a cell grid, and L2 block normalization over
//! sliding 2×2-cell blocks.

use crate::types::{Descriptor, FaceRegion};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Named constants (default geometry) ---
const NORMALIZED_SIZE: usize = 100;
const CELL_SIZE: usize = 8;
const BLOCK_CELLS: usize = 2;
const ORIENTATION_BINS: usize = 9;
const BLOCK_NORM_EPS: f32 = 1e-5;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("face region is malformed ({width}x{height})")]
    ExtractionFailed { width: u32, height: u32 },
    #[error("descriptor length {actual} does not match expected {expected}")]
    FeatureSizeMismatch { expected: usize, actual: usize },
}

/// Descriptor geometry. The descriptor width is derived from these fields,
/// so changing any of them invalidates every persisted corpus and model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HogConfig {
    /// Side length of the normalized square the region is resized to.
    pub normalized_size: usize,
    /// Cell side length in pixels.
    pub cell_size: usize,
    /// Block side length in cells.
    pub block_cells: usize,
    /// Number of unsigned orientation bins over [0°, 180°).
    pub orientation_bins: usize,
}

impl Default for HogConfig {
    fn default() -> Self {
        Self {
            normalized_size: NORMALIZED_SIZE,
            cell_size: CELL_SIZE,
            block_cells: BLOCK_CELLS,
            orientation_bins: ORIENTATION_BINS,
        }
    }
}

impl HogConfig {
    /// Cells per side of the normalized image.
    fn cells_per_side(&self) -> usize {
        self.normalized_size / self.cell_size
    }

    /// Blocks per side (sliding blocks, stride of one cell).
    fn blocks_per_side(&self) -> usize {
        self.cells_per_side() + 1 - self.block_cells
    }

    /// Fixed descriptor length `D` for this geometry.
    pub fn descriptor_len(&self) -> usize {
        let blocks = self.blocks_per_side();
        blocks * blocks * self.block_cells * self.block_cells * self.orientation_bins
    }
}

/// Gradient-histogram descriptor extractor.
pub struct HogExtractor {
    config: HogConfig,
}

impl HogExtractor {
    pub fn new(config: HogConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HogConfig {
        &self.config
    }

    /// Expected descriptor length for this extractor's geometry.
    pub fn descriptor_len(&self) -> usize {
        self.config.descriptor_len()
    }

    /// Extract a descriptor from an accepted face region.
    ///
    /// Never pads or truncates: a length mismatch against the configured
    /// geometry is returned as `FeatureSizeMismatch` so the caller skips the
    /// sample instead of corrupting the corpus.
    pub fn extract(&self, region: &FaceRegion) -> Result<Descriptor, ExtractError> {
        if region.width == 0
            || region.height == 0
            || region.data.len() != (region.width * region.height) as usize
        {
            return Err(ExtractError::ExtractionFailed {
                width: region.width,
                height: region.height,
            });
        }

        let size = self.config.normalized_size;
        let resized = resize_bilinear(
            &region.data,
            region.width as usize,
            region.height as usize,
            size,
        );

        let values = self.histogram_features(&resized, size);

        let expected = self.config.descriptor_len();
        if values.len() != expected {
            return Err(ExtractError::FeatureSizeMismatch {
                expected,
                actual: values.len(),
            });
        }

        Ok(Descriptor { values })
    }

    /// Cell histograms + sliding-block L2 normalization.
    fn histogram_features(&self, gray: &[u8], size: usize) -> Vec<f32> {
        let cells = self.config.cells_per_side();
        let cell = self.config.cell_size;
        let bins = self.config.orientation_bins;
        let bin_width = 180.0 / bins as f32;

        // Per-cell orientation histograms, magnitude-weighted with linear
        // interpolation between the two nearest bins.
        let mut hist = vec![0.0f32; cells * cells * bins];

        let px = |x: usize, y: usize| gray[y * size + x] as f32;

        for y in 0..size {
            for x in 0..size {
                let cy = y / cell;
                let cx = x / cell;
                if cy >= cells || cx >= cells {
                    continue;
                }

                // Centered differences, replicated at the border.
                let gx = px((x + 1).min(size - 1), y) - px(x.saturating_sub(1), y);
                let gy = px(x, (y + 1).min(size - 1)) - px(x, y.saturating_sub(1));

                let magnitude = (gx * gx + gy * gy).sqrt();
                if magnitude == 0.0 {
                    continue;
                }

                // Unsigned orientation in [0, 180).
                let mut angle = gy.atan2(gx).to_degrees();
                if angle < 0.0 {
                    angle += 180.0;
                }
                if angle >= 180.0 {
                    angle -= 180.0;
                }

                let pos = angle / bin_width - 0.5;
                let lo = pos.floor();
                let frac = pos - lo;
                let bin_lo = ((lo as isize).rem_euclid(bins as isize)) as usize;
                let bin_hi = (bin_lo + 1) % bins;

                let base = (cy * cells + cx) * bins;
                hist[base + bin_lo] += magnitude * (1.0 - frac);
                hist[base + bin_hi] += magnitude * frac;
            }
        }

        // Sliding blocks, stride one cell, L2-normalized per block.
        let block = self.config.block_cells;
        let blocks = self.config.blocks_per_side();
        let mut features = Vec::with_capacity(blocks * blocks * block * block * bins);

        for by in 0..blocks {
            for bx in 0..blocks {
                let start = features.len();
                for cy in by..by + block {
                    for cx in bx..bx + block {
                        let base = (cy * cells + cx) * bins;
                        features.extend_from_slice(&hist[base..base + bins]);
                    }
                }

                let norm = features[start..]
                    .iter()
                    .map(|v| v * v)
                    .sum::<f32>()
                    .sqrt();
                let denom = norm + BLOCK_NORM_EPS;
                for v in &mut features[start..] {
                    *v /= denom;
                }
            }
        }

        features
    }
}

/// Resize a grayscale image to a square using bilinear interpolation.
fn resize_bilinear(data: &[u8], width: usize, height: usize, size: usize) -> Vec<u8> {
    let scale_x = width as f32 / size as f32;
    let scale_y = height as f32 / size as f32;

    let mut resized = vec![0u8; size * size];
    for y in 0..size {
        let src_y = (y as f32 + 0.5) * scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
        let y1 = (y0 + 1).min(height - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..size {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
            let x1 = (x0 + 1).min(width - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            let tl = data[y0 * width + x0] as f32;
            let tr = data[y0 * width + x1] as f32;
            let bl = data[y1 * width + x0] as f32;
            let br = data[y1 * width + x1] as f32;

            let val = tl * (1.0 - fx) * (1.0 - fy)
                + tr * fx * (1.0 - fy)
                + bl * (1.0 - fx) * fy
                + br * fx * fy;

            resized[y * size + x] = val.round().clamp(0.0, 255.0) as u8;
        }
    }

    resized
}
