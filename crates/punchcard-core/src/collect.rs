//! Training-sample collection pipeline.
//!
//! Drives frames through localization, quality gating, augmentation and
//! extraction until a target descriptor count is reached or the source runs
//! out. Iteration is frame-bounded; a run that collects nothing is a normal
//! outcome, not an error.

use crate::augment;
use crate::hog::HogExtractor;
use crate::quality::{self, QualityConfig};
use crate::source::{FaceLocator, FrameSource, SourceError};
use crate::types::{Descriptor, FaceRegion};
use serde::{Deserialize, Serialize};

// --- Named constants ---
const TARGET_SAMPLES: usize = 40;
const MAX_FRAMES: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Descriptor count to stop at. Each accepted region contributes up to
    /// [`augment::VARIANTS_PER_SAMPLE`] descriptors.
    pub target_samples: usize,
    /// Hard bound on frames pulled, so short or faceless footage terminates.
    pub max_frames: usize,
    pub quality: QualityConfig,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            target_samples: TARGET_SAMPLES,
            max_frames: MAX_FRAMES,
            quality: QualityConfig::default(),
        }
    }
}

/// What a collection run produced.
#[derive(Debug)]
pub struct CollectReport {
    pub descriptors: Vec<Descriptor>,
    pub frames_seen: usize,
    /// Regions that passed the quality gate.
    pub accepted_regions: usize,
    /// Regions rejected by the quality gate.
    pub rejected_regions: usize,
}

/// Collect descriptors for one identity from a frame source.
pub fn collect_samples(
    source: &mut dyn FrameSource,
    locator: &dyn FaceLocator,
    extractor: &HogExtractor,
    config: &CollectConfig,
) -> Result<CollectReport, SourceError> {
    let mut report = CollectReport {
        descriptors: Vec::new(),
        frames_seen: 0,
        accepted_regions: 0,
        rejected_regions: 0,
    };

    while report.descriptors.len() < config.target_samples && report.frames_seen < config.max_frames
    {
        let Some(frame) = source.next_frame()? else {
            break;
        };
        report.frames_seen += 1;

        for bbox in locator.locate(&frame) {
            let Some(region) = FaceRegion::crop(&frame, &bbox) else {
                continue;
            };

            let verdict = quality::assess(&region, &config.quality);
            if !verdict.is_accepted() {
                report.rejected_regions += 1;
                tracing::debug!(frame = frame.sequence, ?verdict, "skipping low-quality region");
                continue;
            }
            report.accepted_regions += 1;

            for variant in augment::variants(&region) {
                match extractor.extract(&variant) {
                    Ok(descriptor) => report.descriptors.push(descriptor),
                    // A failing variant is dropped, not retried.
                    Err(e) => tracing::debug!(frame = frame.sequence, error = %e, "variant dropped"),
                }
            }

            if report.descriptors.len() >= config.target_samples {
                break;
            }
        }
    }

    tracing::info!(
        descriptors = report.descriptors.len(),
        frames = report.frames_seen,
        accepted = report.accepted_regions,
        rejected = report.rejected_regions,
        "collection finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augment::VARIANTS_PER_SAMPLE;
    use crate::hog::{HogConfig, HogExtractor};
    use crate::source::{FullFrameLocator, MemoryFrameSource};
    use crate::types::GrayFrame;

    fn sharp_frame(sequence: u32) -> GrayFrame {
        let side = 64u32;
        let data = (0..side * side)
            .map(|i| {
                let (x, y) = (i % side, i / side);
                if (x / 4 + y / 4) % 2 == 0 {
                    220
                } else {
                    30
                }
            })
            .collect();
        GrayFrame { data, width: side, height: side, sequence }
    }

    fn dark_frame(sequence: u32) -> GrayFrame {
        GrayFrame {
            data: vec![5; 64 * 64],
            width: 64,
            height: 64,
            sequence,
        }
    }

    #[test]
    fn test_collects_target_in_variant_multiples() {
        let frames: Vec<GrayFrame> = (0..20).map(sharp_frame).collect();
        let mut source = MemoryFrameSource::new(frames);
        let config = CollectConfig { target_samples: 12, ..CollectConfig::default() };

        let report = collect_samples(
            &mut source,
            &FullFrameLocator,
            &HogExtractor::new(HogConfig::default()),
            &config,
        )
        .unwrap();

        assert_eq!(report.descriptors.len(), 12);
        assert_eq!(report.frames_seen, 12 / VARIANTS_PER_SAMPLE);
        assert_eq!(report.rejected_regions, 0);
    }

    #[test]
    fn test_low_quality_frames_skipped() {
        let frames = vec![dark_frame(0), dark_frame(1), sharp_frame(2)];
        let mut source = MemoryFrameSource::new(frames);
        let config = CollectConfig { target_samples: 4, ..CollectConfig::default() };

        let report = collect_samples(
            &mut source,
            &FullFrameLocator,
            &HogExtractor::new(HogConfig::default()),
            &config,
        )
        .unwrap();

        assert_eq!(report.descriptors.len(), VARIANTS_PER_SAMPLE);
        assert_eq!(report.rejected_regions, 2);
        assert_eq!(report.accepted_regions, 1);
    }

    #[test]
    fn test_exhausted_source_is_not_an_error() {
        let mut source = MemoryFrameSource::new(vec![dark_frame(0)]);
        let report = collect_samples(
            &mut source,
            &FullFrameLocator,
            &HogExtractor::new(HogConfig::default()),
            &CollectConfig::default(),
        )
        .unwrap();
        assert!(report.descriptors.is_empty());
        assert_eq!(report.frames_seen, 1);
    }

    #[test]
    fn test_frame_bound_terminates() {
        // An endless stream of dark frames must stop at max_frames.
        let frames: Vec<GrayFrame> = (0..50).map(dark_frame).collect();
        let mut source = MemoryFrameSource::new(frames);
        let config = CollectConfig { max_frames: 10, ..CollectConfig::default() };

        let report = collect_samples(
            &mut source,
            &FullFrameLocator,
            &HogExtractor::new(HogConfig::default()),
            &config,
        )
        .unwrap();
        assert_eq!(report.frames_seen, 10);
        assert!(report.descriptors.is_empty());
    }

    #[test]
    fn test_descriptors_share_width() {
        let frames: Vec<GrayFrame> = (0..3).map(sharp_frame).collect();
        let mut source = MemoryFrameSource::new(frames);
        let extractor = HogExtractor::new(HogConfig::default());
        let config = CollectConfig { target_samples: 8, ..CollectConfig::default() };

        let report =
            collect_samples(&mut source, &FullFrameLocator, &extractor, &config).unwrap();
        assert!(report
            .descriptors
            .iter()
            .all(|d| d.len() == extractor.descriptor_len()));
    }
}
