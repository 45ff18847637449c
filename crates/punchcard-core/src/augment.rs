//! Deterministic training-set augmentation.
//!
//! One accepted region yields a fixed set of variants: the original, a
//! horizontal mirror, and two brightness-scaled copies. No randomness, so
//! repeated collection runs over the same footage produce the same corpus.

use crate::types::FaceRegion;

// --- Named constants ---
const BRIGHTEN_GAIN: f32 = 1.2;
const DARKEN_GAIN: f32 = 0.8;

/// Variants produced per accepted region.
pub const VARIANTS_PER_SAMPLE: usize = 4;

/// Produce the augmentation variants for one accepted region, in a fixed
/// order: original, mirror, brightened, darkened.
pub fn variants(region: &FaceRegion) -> Vec<FaceRegion> {
    vec![
        region.clone(),
        mirror_horizontal(region),
        scale_brightness(region, BRIGHTEN_GAIN),
        scale_brightness(region, DARKEN_GAIN),
    ]
}

/// Flip a region around its vertical axis.
fn mirror_horizontal(region: &FaceRegion) -> FaceRegion {
    let w = region.width as usize;
    let mut data = region.data.clone();
    for row in data.chunks_mut(w) {
        row.reverse();
    }
    FaceRegion { data, ..region.clone() }
}

/// Multiply every pixel by `gain`, clamped to the valid intensity range.
fn scale_brightness(region: &FaceRegion, gain: f32) -> FaceRegion {
    let data = region
        .data
        .iter()
        .map(|&p| (p as f32 * gain).round().clamp(0.0, 255.0) as u8)
        .collect();
    FaceRegion { data, ..region.clone() }
}
