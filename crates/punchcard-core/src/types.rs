use serde::{Deserialize, Serialize};

/// A single-channel intensity frame pulled from a frame source.
#[derive(Debug, Clone)]
pub struct GrayFrame {
    /// Grayscale pixel data (width * height bytes, row-major).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Position of this frame in its source stream.
    pub sequence: u32,
}

impl GrayFrame {
    /// Average pixel brightness (0.0–255.0).
    pub fn avg_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&b| b as f32).sum::<f32>() / self.data.len() as f32
    }
}

/// Axis-aligned rectangle for a located face, in frame coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A cropped face region with provenance. Ephemeral — never persisted directly.
#[derive(Debug, Clone)]
pub struct FaceRegion {
    /// Grayscale pixel data (width * height bytes, row-major).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Sequence number of the frame this region was cropped from.
    pub source_sequence: u32,
}

impl FaceRegion {
    /// Crop a region out of a frame, clamping the box to the frame bounds.
    ///
    /// Returns `None` when the clamped box is empty (box entirely outside
    /// the frame, or zero-sized).
    pub fn crop(frame: &GrayFrame, bbox: &FaceBox) -> Option<FaceRegion> {
        let x0 = bbox.x.min(frame.width);
        let y0 = bbox.y.min(frame.height);
        let x1 = bbox.x.saturating_add(bbox.width).min(frame.width);
        let y1 = bbox.y.saturating_add(bbox.height).min(frame.height);

        let w = x1.saturating_sub(x0);
        let h = y1.saturating_sub(y0);
        if w == 0 || h == 0 {
            return None;
        }

        let mut data = Vec::with_capacity((w * h) as usize);
        for y in y0..y1 {
            let row_start = (y * frame.width + x0) as usize;
            data.extend_from_slice(&frame.data[row_start..row_start + w as usize]);
        }

        Some(FaceRegion {
            data,
            width: w,
            height: h,
            source_sequence: frame.sequence,
        })
    }

    /// Mean pixel intensity (0.0–255.0).
    pub fn mean_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&b| b as f32).sum::<f32>() / self.data.len() as f32
    }
}

/// Fixed-length gradient-histogram descriptor for one face region.
///
/// Every descriptor in a corpus has the same length; the width is set by the
/// extraction geometry, and any mismatch is a hard validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
