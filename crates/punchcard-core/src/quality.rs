//! Sample quality gating — brightness and sharpness floors.
//!
//! Dark, blurry or tiny regions carry too little gradient structure to train
//! on, so they are rejected before descriptor extraction. Pure predicate,
//! no side effects.

use crate::types::FaceRegion;
use serde::{Deserialize, Serialize};

// --- Named constants ---
const MIN_REGION_SIZE: u32 = 10;
const BRIGHTNESS_FLOOR: f32 = 50.0;
const SHARPNESS_FLOOR: f32 = 100.0;

/// Quality thresholds. Fixed configuration constants, not learned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Minimum region side length in pixels.
    pub min_region_size: u32,
    /// Minimum mean intensity (0–255).
    pub brightness_floor: f32,
    /// Minimum variance of the Laplacian edge response.
    pub sharpness_floor: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_region_size: MIN_REGION_SIZE,
            brightness_floor: BRIGHTNESS_FLOOR,
            sharpness_floor: SHARPNESS_FLOOR,
        }
    }
}

/// Outcome of assessing one face region.
#[derive(Debug, Clone, PartialEq)]
pub enum QualityVerdict {
    Accepted { brightness: f32, sharpness: f32 },
    TooSmall { width: u32, height: u32 },
    TooDark { brightness: f32 },
    TooBlurry { sharpness: f32 },
}

impl QualityVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, QualityVerdict::Accepted { .. })
    }
}

/// Assess a face region against the configured floors.
pub fn assess(region: &FaceRegion, config: &QualityConfig) -> QualityVerdict {
    if region.width < config.min_region_size || region.height < config.min_region_size {
        return QualityVerdict::TooSmall {
            width: region.width,
            height: region.height,
        };
    }

    let brightness = region.mean_brightness();
    if brightness <= config.brightness_floor {
        return QualityVerdict::TooDark { brightness };
    }

    let sharpness = laplacian_variance(region);
    if sharpness <= config.sharpness_floor {
        return QualityVerdict::TooBlurry { sharpness };
    }

    QualityVerdict::Accepted {
        brightness,
        sharpness,
    }
}

/// Variance of the 3×3 Laplacian response over interior pixels.
///
/// The Laplacian is a second-derivative edge operator: a sharp image has a
/// wide response distribution, a defocused or motion-smeared one collapses
/// toward zero.
fn laplacian_variance(region: &FaceRegion) -> f32 {
    let w = region.width as usize;
    let h = region.height as usize;
    if w < 3 || h < 3 {
        return 0.0;
    }

    let px = |x: usize, y: usize| region.data[y * w + x] as f32;

    let mut responses = Vec::with_capacity((w - 2) * (h - 2));
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = px(x - 1, y) + px(x + 1, y) + px(x, y - 1) + px(x, y + 1) - 4.0 * px(x, y);
            responses.push(lap);
        }
    }

    let n = responses.len() as f32;
    let mean = responses.iter().sum::<f32>() / n;
    responses.iter().map(|r| (r - mean).powi(2)).sum::<f32>() / n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(data: Vec<u8>, width: u32, height: u32) -> FaceRegion {
        FaceRegion {
            data,
            width,
            height,
            source_sequence: 0,
        }
    }

    /// High-contrast checkerboard: bright and sharp.
    fn checkerboard(side: u32) -> FaceRegion {
        let data = (0..side * side)
            .map(|i| {
                let (x, y) = (i % side, i / side);
                if (x + y) % 2 == 0 {
                    255
                } else {
                    40
                }
            })
            .collect();
        region(data, side, side)
    }

    #[test]
    fn test_rejects_small_region() {
        let r = checkerboard(8);
        let verdict = assess(&r, &QualityConfig::default());
        assert_eq!(
            verdict,
            QualityVerdict::TooSmall { width: 8, height: 8 }
        );
    }

    #[test]
    fn test_rejects_dark_region() {
        let r = region(vec![10u8; 32 * 32], 32, 32);
        let verdict = assess(&r, &QualityConfig::default());
        assert!(matches!(verdict, QualityVerdict::TooDark { .. }));
    }

    #[test]
    fn test_rejects_flat_region() {
        // Bright but uniform: zero Laplacian response everywhere.
        let r = region(vec![200u8; 32 * 32], 32, 32);
        let verdict = assess(&r, &QualityConfig::default());
        assert!(matches!(verdict, QualityVerdict::TooBlurry { sharpness } if sharpness == 0.0));
    }

    #[test]
    fn test_accepts_bright_sharp_region() {
        let r = checkerboard(32);
        let verdict = assess(&r, &QualityConfig::default());
        assert!(verdict.is_accepted(), "got {verdict:?}");
    }

    #[test]
    fn test_assess_is_pure() {
        let r = checkerboard(32);
        let before = r.data.clone();
        let _ = assess(&r, &QualityConfig::default());
        assert_eq!(r.data, before);
    }

    #[test]
    fn test_laplacian_variance_orders_sharpness() {
        // A step edge has a sharper response than a smooth ramp.
        let side = 32u32;
        let step: Vec<u8> = (0..side * side)
            .map(|i| if i % side < side / 2 { 30 } else { 220 })
            .collect();
        let ramp: Vec<u8> = (0..side * side)
            .map(|i| ((i % side) * 255 / side) as u8)
            .collect();

        let v_step = laplacian_variance(&region(step, side, side));
        let v_ramp = laplacian_variance(&region(ramp, side, side));
        assert!(v_step > v_ramp, "step {v_step} vs ramp {v_ramp}");
    }
}
