//! Confidence-gated recognition decision.
//!
//! A bounded state machine per recognition attempt: pull frames, locate a
//! face, extract a descriptor, classify, and decide. The decision verifies a
//! *claimed* identity; a correctly-classified other identity never passes,
//! whatever its confidence. Ambiguity always resolves to rejection.

use crate::hog::HogExtractor;
use crate::learner::TrainedLearner;
use crate::quality::{self, QualityConfig};
use crate::source::{FaceLocator, FrameSource, SourceError};
use crate::types::{Descriptor, FaceRegion};
use serde::{Deserialize, Serialize};
use std::fmt;

// --- Named constants ---
const MAX_ATTEMPTS: usize = 10;

/// Caller role for a recognition run. Administrators get a dry run: the
/// decision is produced but must not be forwarded to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Operator,
    Administrator,
}

/// Explicit per-call context: who the session claims to be, and in what
/// role. Never read from ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionContext {
    pub claimed_identity: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Frame attempts before the run terminates as `NoFaceFound`.
    pub max_attempts: usize,
    /// Explicit threshold override; when unset the model artifact's
    /// recommended threshold applies.
    pub threshold_override: Option<f32>,
    /// Recognition may accept lower quality than training; off by default.
    pub enforce_quality: bool,
    pub quality: QualityConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            threshold_override: None,
            enforce_quality: false,
            quality: QualityConfig::default(),
        }
    }
}

/// Typed rejection outcomes. These are decisions, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum RejectReason {
    NoFaceFound { attempts: usize },
    LowConfidence { confidence: f32, threshold: f32 },
    IdentityMismatch { predicted: String },
    IdentityNotEnrolled { identity: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoFaceFound { attempts } => {
                write!(f, "no usable face found in {attempts} frame(s)")
            }
            RejectReason::LowConfidence { confidence, threshold } => write!(
                f,
                "confidence {:.0}% below the {:.0}% threshold; try again",
                confidence * 100.0,
                threshold * 100.0
            ),
            RejectReason::IdentityMismatch { .. } => {
                write!(f, "face does not match the claimed identity")
            }
            RejectReason::IdentityNotEnrolled { identity } => {
                write!(f, "no face data collected for {identity}; contact an administrator")
            }
        }
    }
}

/// Terminal state of one recognition run.
#[derive(Debug, Clone)]
pub enum RecognitionOutcome {
    Accepted {
        identity: String,
        confidence: f32,
        /// The accepted face region, for evidence snapshots.
        region: FaceRegion,
    },
    Rejected(RejectReason),
}

impl RecognitionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RecognitionOutcome::Accepted { .. })
    }
}

/// A loaded decision function bound to its label set and threshold.
pub struct Recognizer<'a> {
    learner: &'a TrainedLearner,
    classes: &'a [String],
    threshold: f32,
}

impl<'a> Recognizer<'a> {
    pub fn new(learner: &'a TrainedLearner, classes: &'a [String], threshold: f32) -> Self {
        Self {
            learner,
            classes,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_enrolled(&self, identity: &str) -> bool {
        self.classes.iter().any(|c| c == identity)
    }

    /// Decide one descriptor against a claimed identity.
    ///
    /// Identity mismatch is checked before the confidence floor: a
    /// confidently-recognized *other* person must read as an impersonation
    /// attempt, not as noise.
    pub fn decide(&self, descriptor: &Descriptor, claimed: &str) -> Result<f32, RejectReason> {
        let prediction = self.learner.predict_with_confidence(&descriptor.values);
        let predicted = self
            .classes
            .get(prediction.class)
            .map(String::as_str)
            .unwrap_or("");

        if predicted != claimed {
            return Err(RejectReason::IdentityMismatch {
                predicted: predicted.to_string(),
            });
        }
        if prediction.confidence < self.threshold {
            return Err(RejectReason::LowConfidence {
                confidence: prediction.confidence,
                threshold: self.threshold,
            });
        }
        Ok(prediction.confidence)
    }
}

/// Drive one recognition attempt to a terminal outcome.
///
/// Bounded by `config.max_attempts` frames; end-of-stream terminates early.
/// Multiple faces in one frame are processed independently in order; the
/// first region that survives extraction is terminal.
pub fn run_recognition(
    recognizer: &Recognizer<'_>,
    context: &RecognitionContext,
    source: &mut dyn FrameSource,
    locator: &dyn FaceLocator,
    extractor: &HogExtractor,
    config: &GateConfig,
) -> Result<RecognitionOutcome, SourceError> {
    if !recognizer.is_enrolled(&context.claimed_identity) {
        return Ok(RecognitionOutcome::Rejected(
            RejectReason::IdentityNotEnrolled {
                identity: context.claimed_identity.clone(),
            },
        ));
    }

    let mut attempts = 0usize;
    while attempts < config.max_attempts {
        let Some(frame) = source.next_frame()? else {
            break;
        };
        attempts += 1;

        for bbox in locator.locate(&frame) {
            let Some(region) = FaceRegion::crop(&frame, &bbox) else {
                continue;
            };

            if config.enforce_quality {
                let verdict = quality::assess(&region, &config.quality);
                if !verdict.is_accepted() {
                    tracing::debug!(attempt = attempts, ?verdict, "region rejected by quality gate");
                    continue;
                }
            }

            let descriptor = match extractor.extract(&region) {
                Ok(d) => d,
                Err(e) => {
                    // Back to scanning; the next frame may do better.
                    tracing::debug!(attempt = attempts, error = %e, "extraction failed");
                    continue;
                }
            };

            let outcome = match recognizer.decide(&descriptor, &context.claimed_identity) {
                Ok(confidence) => {
                    tracing::info!(
                        identity = %context.claimed_identity,
                        confidence,
                        attempts,
                        "recognition accepted"
                    );
                    RecognitionOutcome::Accepted {
                        identity: context.claimed_identity.clone(),
                        confidence,
                        region,
                    }
                }
                Err(reason) => {
                    tracing::info!(
                        identity = %context.claimed_identity,
                        %reason,
                        attempts,
                        "recognition rejected"
                    );
                    RecognitionOutcome::Rejected(reason)
                }
            };
            return Ok(outcome);
        }
    }

    Ok(RecognitionOutcome::Rejected(RejectReason::NoFaceFound {
        attempts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hog::{HogConfig, HogExtractor};
    use crate::learner::LearnerKind;
    use crate::source::{FaceLocator, FullFrameLocator, MemoryFrameSource};
    use crate::trainer::{self, TrainerConfig};
    use crate::types::{FaceBox, GrayFrame};
    use ndarray::Array2;

    fn classes() -> Vec<String> {
        vec!["alice".to_string(), "bob".to_string()]
    }

    /// KNN over two separated 4-d clusters; alice near (1,1,0,0).
    fn fitted_learner() -> TrainedLearner {
        let rows = vec![
            1.0, 1.0, 0.0, 0.0, //
            0.9, 1.0, 0.1, 0.0, //
            1.0, 0.9, 0.0, 0.1, //
            0.0, 0.0, 1.0, 1.0, //
            0.1, 0.0, 0.9, 1.0, //
            0.0, 0.1, 1.0, 0.9,
        ];
        let samples = Array2::from_shape_vec((6, 4), rows).unwrap();
        LearnerKind::Knn
            .fit(samples.view(), &[0, 0, 0, 1, 1, 1], 2, 0)
            .unwrap()
    }

    fn alice_descriptor() -> Descriptor {
        Descriptor { values: vec![1.0, 1.0, 0.0, 0.0] }
    }

    #[test]
    fn test_accept_at_threshold() {
        let learner = fitted_learner();
        let classes = classes();
        let recognizer = Recognizer::new(&learner, &classes, 0.8);
        let confidence = recognizer.decide(&alice_descriptor(), "alice").unwrap();
        assert!(confidence >= 0.8);
    }

    #[test]
    fn test_confidence_monotonicity() {
        // Accepting at threshold t implies accepting at any t' <= t.
        let learner = fitted_learner();
        let classes = classes();
        let descriptor = alice_descriptor();

        let accepting = Recognizer::new(&learner, &classes, 0.7);
        assert!(accepting.decide(&descriptor, "alice").is_ok());

        for lower in [0.5, 0.3, 0.0] {
            let relaxed = Recognizer::new(&learner, &classes, lower);
            assert!(
                relaxed.decide(&descriptor, "alice").is_ok(),
                "accepted at 0.7 but rejected at {lower}"
            );
        }
    }

    #[test]
    fn test_low_confidence_rejected() {
        let learner = fitted_learner();
        let classes = classes();
        // Impossible bar: even a perfect match fails it.
        let recognizer = Recognizer::new(&learner, &classes, 1.1);
        let reason = recognizer.decide(&alice_descriptor(), "alice").unwrap_err();
        assert!(matches!(reason, RejectReason::LowConfidence { threshold, .. } if threshold == 1.1));
    }

    #[test]
    fn test_identity_mismatch_precedence() {
        // A perfect-confidence alice match claiming to be bob is an
        // impersonation attempt, never a confidence problem.
        let learner = fitted_learner();
        let classes = classes();

        for threshold in [0.0, 0.8, 1.1] {
            let recognizer = Recognizer::new(&learner, &classes, threshold);
            let reason = recognizer.decide(&alice_descriptor(), "bob").unwrap_err();
            assert_eq!(
                reason,
                RejectReason::IdentityMismatch { predicted: "alice".to_string() },
                "threshold {threshold}"
            );
        }
    }

    #[test]
    fn test_unenrolled_identity_short_circuits() {
        let learner = fitted_learner();
        let classes = classes();
        let recognizer = Recognizer::new(&learner, &classes, 0.5);
        let context = RecognitionContext {
            claimed_identity: "carol".to_string(),
            role: Role::Operator,
        };

        // No frames at all: the precheck must not pull any.
        let mut source = MemoryFrameSource::new(vec![]);
        let outcome = run_recognition(
            &recognizer,
            &context,
            &mut source,
            &FullFrameLocator,
            &HogExtractor::new(HogConfig::default()),
            &GateConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            outcome,
            RecognitionOutcome::Rejected(RejectReason::IdentityNotEnrolled { .. })
        ));
    }

    struct NoFaces;
    impl FaceLocator for NoFaces {
        fn locate(&self, _frame: &GrayFrame) -> Vec<FaceBox> {
            Vec::new()
        }
    }

    fn blank_frames(n: usize) -> Vec<GrayFrame> {
        (0..n)
            .map(|i| GrayFrame {
                data: vec![128; 16],
                width: 4,
                height: 4,
                sequence: i as u32,
            })
            .collect()
    }

    #[test]
    fn test_attempts_exhausted() {
        let learner = fitted_learner();
        let classes = classes();
        let recognizer = Recognizer::new(&learner, &classes, 0.5);
        let context = RecognitionContext {
            claimed_identity: "alice".to_string(),
            role: Role::Operator,
        };
        let config = GateConfig { max_attempts: 3, ..GateConfig::default() };

        // More frames than attempts: the bound wins.
        let mut source = MemoryFrameSource::new(blank_frames(10));
        let outcome = run_recognition(
            &recognizer,
            &context,
            &mut source,
            &NoFaces,
            &HogExtractor::new(HogConfig::default()),
            &config,
        )
        .unwrap();
        assert!(matches!(
            outcome,
            RecognitionOutcome::Rejected(RejectReason::NoFaceFound { attempts: 3 })
        ));
    }

    #[test]
    fn test_end_of_stream_terminates_early() {
        let learner = fitted_learner();
        let classes = classes();
        let recognizer = Recognizer::new(&learner, &classes, 0.5);
        let context = RecognitionContext {
            claimed_identity: "alice".to_string(),
            role: Role::Operator,
        };

        let mut source = MemoryFrameSource::new(blank_frames(2));
        let outcome = run_recognition(
            &recognizer,
            &context,
            &mut source,
            &NoFaces,
            &HogExtractor::new(HogConfig::default()),
            &GateConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            outcome,
            RecognitionOutcome::Rejected(RejectReason::NoFaceFound { attempts: 2 })
        ));
    }

    /// Vertical or horizontal stripes, 64×64 — cleanly separable textures.
    fn striped_frame(vertical: bool, sequence: u32) -> GrayFrame {
        let side = 64u32;
        let data = (0..side * side)
            .map(|i| {
                let (x, y) = (i % side, i / side);
                let band = if vertical { x } else { y };
                if (band / 8) % 2 == 0 {
                    230
                } else {
                    25
                }
            })
            .collect();
        GrayFrame { data, width: side, height: side, sequence }
    }

    /// End-to-end over real extraction: train on stripe textures, then
    /// recognize an "alice" frame while claiming bob and vice versa.
    #[test]
    fn test_pipeline_scenario_mismatch() {
        let extractor = HogExtractor::new(HogConfig::default());
        let locator = FullFrameLocator;

        let mut descriptors = Vec::new();
        let mut labels = Vec::new();
        for i in 0..6 {
            let v = FaceRegion::crop(
                &striped_frame(true, i),
                &locator.locate(&striped_frame(true, i))[0],
            )
            .unwrap();
            descriptors.push(extractor.extract(&v).unwrap());
            labels.push("alice".to_string());

            let h = FaceRegion::crop(
                &striped_frame(false, i),
                &locator.locate(&striped_frame(false, i))[0],
            )
            .unwrap();
            descriptors.push(extractor.extract(&h).unwrap());
            labels.push("bob".to_string());
        }

        let model = trainer::train(
            &descriptors,
            &labels,
            &TrainerConfig { learner: LearnerKind::Knn, ..TrainerConfig::default() },
        )
        .unwrap();
        assert_eq!(model.classes, vec!["alice".to_string(), "bob".to_string()]);

        let recognizer = Recognizer::new(
            &model.learner,
            &model.classes,
            model.report.recommended_threshold,
        );

        // An alice face claiming alice passes.
        let context = RecognitionContext {
            claimed_identity: "alice".to_string(),
            role: Role::Operator,
        };
        let mut source = MemoryFrameSource::new(vec![striped_frame(true, 99)]);
        let outcome = run_recognition(
            &recognizer,
            &context,
            &mut source,
            &locator,
            &extractor,
            &GateConfig::default(),
        )
        .unwrap();
        assert!(outcome.is_accepted(), "got {outcome:?}");

        // An alice face claiming bob is an identity mismatch.
        let context = RecognitionContext {
            claimed_identity: "bob".to_string(),
            role: Role::Operator,
        };
        let mut source = MemoryFrameSource::new(vec![striped_frame(true, 99)]);
        let outcome = run_recognition(
            &recognizer,
            &context,
            &mut source,
            &locator,
            &extractor,
            &GateConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            outcome,
            RecognitionOutcome::Rejected(RejectReason::IdentityMismatch { ref predicted })
                if predicted == "alice"
        ));
    }

    #[test]
    fn test_quality_gate_skips_dark_frames() {
        let extractor = HogExtractor::new(HogConfig::default());
        let locator = FullFrameLocator;

        let mut descriptors = Vec::new();
        let mut labels = Vec::new();
        for i in 0..6 {
            let frame = striped_frame(true, i);
            let region = FaceRegion::crop(&frame, &locator.locate(&frame)[0]).unwrap();
            descriptors.push(extractor.extract(&region).unwrap());
            labels.push("alice".to_string());
            let frame = striped_frame(false, i);
            let region = FaceRegion::crop(&frame, &locator.locate(&frame)[0]).unwrap();
            descriptors.push(extractor.extract(&region).unwrap());
            labels.push("bob".to_string());
        }
        let model = trainer::train(
            &descriptors,
            &labels,
            &TrainerConfig { learner: LearnerKind::Knn, ..TrainerConfig::default() },
        )
        .unwrap();

        let recognizer = Recognizer::new(&model.learner, &model.classes, 0.5);
        let context = RecognitionContext {
            claimed_identity: "alice".to_string(),
            role: Role::Operator,
        };
        let config = GateConfig { enforce_quality: true, ..GateConfig::default() };

        // A dark frame first, then a good one: the gate skips the dark
        // frame and accepts on the second.
        let dark = GrayFrame {
            data: vec![5; 64 * 64],
            width: 64,
            height: 64,
            sequence: 0,
        };
        let mut source = MemoryFrameSource::new(vec![dark, striped_frame(true, 1)]);
        let outcome = run_recognition(
            &recognizer,
            &context,
            &mut source,
            &locator,
            &extractor,
            &config,
        )
        .unwrap();
        assert!(outcome.is_accepted(), "got {outcome:?}");
    }
}
