//! Classifier training and validation.
//!
//! Fits the configured learner family on a stratified train split, measures
//! generalization on the held-out split, and only then refits on the full
//! corpus. A model that fails the acceptance policy is never produced, so
//! nothing downstream can load it.

use crate::learner::{FitError, LearnerKind, TrainedLearner};
use crate::types::Descriptor;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Named constants (defaults; all overridable in TrainerConfig) ---
const TEST_FRACTION: f32 = 0.3;
const MIN_TEST_ACCURACY: f32 = 0.8;
const OVERFIT_GAP: f32 = 0.15;
const SPLIT_SEED: u64 = 42;
const THRESHOLD_FLOOR: f32 = 0.5;
const THRESHOLD_MARGIN: f32 = 0.1;

/// Whether an excessive train/test accuracy gap rejects the model or only
/// warns. A calibration decision, deliberately not hardcoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapSeverity {
    Warn,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub learner: LearnerKind,
    /// Held-out fraction for the validation split.
    pub test_fraction: f32,
    /// Hard acceptance bar on test accuracy.
    pub min_test_accuracy: f32,
    /// Maximum tolerated `train accuracy − test accuracy`.
    pub overfit_gap: f32,
    pub gap_severity: GapSeverity,
    /// Seed for the stratified shuffle and learner initialization.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            learner: LearnerKind::AdaBoost,
            test_fraction: TEST_FRACTION,
            min_test_accuracy: MIN_TEST_ACCURACY,
            overfit_gap: OVERFIT_GAP,
            gap_severity: GapSeverity::Warn,
            seed: SPLIT_SEED,
        }
    }
}

/// Validation metrics for an accepted model. Persisted inside the artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub train_accuracy: f32,
    pub test_accuracy: f32,
    pub mean_test_confidence: f32,
    /// Advisory recognition threshold derived from test confidence.
    pub recommended_threshold: f32,
    pub train_samples: usize,
    pub test_samples: usize,
}

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("corpus has {distinct} distinct label(s); at least 2 are required")]
    InsufficientClassDiversity { distinct: usize },
    #[error("descriptor count {descriptors} does not match label count {labels}")]
    CountMismatch { descriptors: usize, labels: usize },
    #[error("descriptor widths are inconsistent: {expected} vs {found}")]
    InconsistentWidth { expected: usize, found: usize },
    #[error("test accuracy {accuracy:.2} below acceptance bar {bar:.2}; model not persisted")]
    AccuracyBelowBar { accuracy: f32, bar: f32 },
    #[error("train/test accuracy gap {gap:.2} exceeds {limit:.2}; model not persisted")]
    OverfitGapExceeded { gap: f32, limit: f32 },
    #[error(transparent)]
    Fit(#[from] FitError),
}

/// An accepted model: decision function plus the label set it was trained
/// on. The two travel together from here on.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub learner: TrainedLearner,
    /// Ordered label set; learner class indices point into this.
    pub classes: Vec<String>,
    pub report: TrainReport,
}

/// Train and validate a classifier over a corpus snapshot.
pub fn train(
    descriptors: &[Descriptor],
    labels: &[String],
    config: &TrainerConfig,
) -> Result<TrainedModel, TrainError> {
    if descriptors.len() != labels.len() {
        return Err(TrainError::CountMismatch {
            descriptors: descriptors.len(),
            labels: labels.len(),
        });
    }

    // Ordered label set; class index = position.
    let mut classes: Vec<String> = labels.to_vec();
    classes.sort();
    classes.dedup();
    if classes.len() < 2 {
        return Err(TrainError::InsufficientClassDiversity {
            distinct: classes.len(),
        });
    }

    let class_indices: Vec<usize> = labels
        .iter()
        .map(|l| classes.binary_search(l).unwrap_or(0))
        .collect();

    let samples = to_matrix(descriptors)?;
    let (train_idx, test_idx) = stratified_split(
        &class_indices,
        classes.len(),
        config.test_fraction,
        config.seed,
    );

    tracing::debug!(
        train = train_idx.len(),
        test = test_idx.len(),
        classes = classes.len(),
        "stratified split"
    );

    let train_samples = select_rows(&samples, &train_idx);
    let train_labels: Vec<usize> = train_idx.iter().map(|&i| class_indices[i]).collect();

    let split_model =
        config
            .learner
            .fit(train_samples.view(), &train_labels, classes.len(), config.seed)?;

    let train_accuracy = accuracy(&split_model, &train_samples, &train_labels);

    let mut correct = 0usize;
    let mut confidence_sum = 0.0f32;
    for &i in &test_idx {
        let prediction = split_model.predict_with_confidence(&descriptors[i].values);
        if prediction.class == class_indices[i] {
            correct += 1;
        }
        confidence_sum += prediction.confidence;
    }
    let test_accuracy = correct as f32 / test_idx.len().max(1) as f32;
    let mean_test_confidence = confidence_sum / test_idx.len().max(1) as f32;
    let recommended_threshold = (mean_test_confidence - THRESHOLD_MARGIN).max(THRESHOLD_FLOOR);

    tracing::info!(
        family = %config.learner,
        train_accuracy,
        test_accuracy,
        mean_test_confidence,
        recommended_threshold,
        "validation metrics"
    );

    validate_metrics(train_accuracy, test_accuracy, config)?;

    // Accepted: refit on the entire corpus so no sample is wasted.
    let learner = config
        .learner
        .fit(samples.view(), &class_indices, classes.len(), config.seed)?;

    Ok(TrainedModel {
        learner,
        classes,
        report: TrainReport {
            train_accuracy,
            test_accuracy,
            mean_test_confidence,
            recommended_threshold,
            train_samples: train_idx.len(),
            test_samples: test_idx.len(),
        },
    })
}

/// Acceptance policy over the validation metrics.
fn validate_metrics(
    train_accuracy: f32,
    test_accuracy: f32,
    config: &TrainerConfig,
) -> Result<(), TrainError> {
    if test_accuracy < config.min_test_accuracy {
        return Err(TrainError::AccuracyBelowBar {
            accuracy: test_accuracy,
            bar: config.min_test_accuracy,
        });
    }

    let gap = train_accuracy - test_accuracy;
    if gap > config.overfit_gap {
        match config.gap_severity {
            GapSeverity::Reject => {
                return Err(TrainError::OverfitGapExceeded {
                    gap,
                    limit: config.overfit_gap,
                })
            }
            GapSeverity::Warn => {
                tracing::warn!(
                    gap,
                    limit = config.overfit_gap,
                    "train/test accuracy gap suggests overfitting"
                );
            }
        }
    }

    Ok(())
}

/// Stratified split: per-class seeded shuffle, then a held-out tail. Every
/// class with at least two samples lands in both splits; singleton classes
/// go entirely to the train side.
fn stratified_split(
    class_indices: &[usize],
    n_classes: usize,
    test_fraction: f32,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut per_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &c) in class_indices.iter().enumerate() {
        per_class[c].push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for mut members in per_class {
        members.shuffle(&mut rng);
        let n = members.len();
        let test_count = if n >= 2 {
            (((n as f32) * test_fraction).round() as usize).clamp(1, n - 1)
        } else {
            0
        };
        test.extend_from_slice(&members[..test_count]);
        train.extend_from_slice(&members[test_count..]);
    }

    (train, test)
}

fn to_matrix(descriptors: &[Descriptor]) -> Result<Array2<f32>, TrainError> {
    let width = descriptors.first().map_or(0, Descriptor::len);
    let mut data = Vec::with_capacity(descriptors.len() * width);
    for d in descriptors {
        if d.len() != width {
            return Err(TrainError::InconsistentWidth {
                expected: width,
                found: d.len(),
            });
        }
        data.extend_from_slice(&d.values);
    }
    Ok(Array2::from_shape_vec((descriptors.len(), width), data)
        .unwrap_or_else(|_| Array2::zeros((0, width))))
}

fn select_rows(samples: &Array2<f32>, indices: &[usize]) -> Array2<f32> {
    let width = samples.ncols();
    let mut data = Vec::with_capacity(indices.len() * width);
    for &i in indices {
        data.extend(samples.row(i).iter().copied());
    }
    Array2::from_shape_vec((indices.len(), width), data)
        .unwrap_or_else(|_| Array2::zeros((0, width)))
}

fn accuracy(model: &TrainedLearner, samples: &Array2<f32>, labels: &[usize]) -> f32 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = samples
        .rows()
        .into_iter()
        .zip(labels.iter())
        .filter(|(row, &label)| {
            model.predict_with_confidence(row.as_slice().unwrap_or(&[])).class == label
        })
        .count();
    correct as f32 / labels.len() as f32
}
