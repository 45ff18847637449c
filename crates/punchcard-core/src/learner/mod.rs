//! Tabular learner families.
//!
//! Each family maps a fixed-length descriptor to a class index plus a
//! confidence (probability mass on the top class). Families are independent
//! variants behind one tagged enum: adding a family means adding a variant,
//! not branching existing code.

mod boost;
mod knn;
mod linear;
mod mlp;

pub use boost::BoostModel;
pub use knn::KnnModel;
pub use linear::LinearModel;
pub use mlp::MlpModel;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Learner family selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LearnerKind {
    /// Distance-weighted k-nearest-neighbor.
    Knn,
    /// Margin-based linear classifier (softmax regression).
    Linear,
    /// Ensemble of weak learners (boosted decision stumps).
    #[serde(rename = "adaboost")]
    AdaBoost,
    /// Shallow feed-forward network (one hidden layer).
    Mlp,
}

impl fmt::Display for LearnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LearnerKind::Knn => "knn",
            LearnerKind::Linear => "linear",
            LearnerKind::AdaBoost => "adaboost",
            LearnerKind::Mlp => "mlp",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
#[error("unknown learner kind: {0} (expected knn, linear, adaboost or mlp)")]
pub struct UnknownLearnerKind(String);

impl FromStr for LearnerKind {
    type Err = UnknownLearnerKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "knn" => Ok(LearnerKind::Knn),
            "linear" => Ok(LearnerKind::Linear),
            "adaboost" => Ok(LearnerKind::AdaBoost),
            "mlp" => Ok(LearnerKind::Mlp),
            other => Err(UnknownLearnerKind(other.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum FitError {
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("need at least 2 classes, got {0}")]
    SingleClass(usize),
    #[error("label index {index} out of range for {n_classes} classes")]
    LabelOutOfRange { index: usize, n_classes: usize },
}

/// Prediction for one descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Index into the class list the model was trained with.
    pub class: usize,
    /// Probability mass on the predicted class, in [0, 1].
    pub confidence: f32,
}

/// A fitted decision function. Serialized inside the model artifact together
/// with its class list, never separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "kebab-case")]
pub enum TrainedLearner {
    Knn(KnnModel),
    Linear(LinearModel),
    #[serde(rename = "adaboost")]
    AdaBoost(BoostModel),
    Mlp(MlpModel),
}

impl LearnerKind {
    /// Fit this family on `samples` (rows) with class-index `labels`.
    ///
    /// `seed` drives weight initialization where the family has any; fitting
    /// is deterministic for a fixed seed.
    pub fn fit(
        self,
        samples: ArrayView2<'_, f32>,
        labels: &[usize],
        n_classes: usize,
        seed: u64,
    ) -> Result<TrainedLearner, FitError> {
        if samples.nrows() == 0 || labels.is_empty() {
            return Err(FitError::EmptyTrainingSet);
        }
        if n_classes < 2 {
            return Err(FitError::SingleClass(n_classes));
        }
        if let Some(&index) = labels.iter().find(|&&l| l >= n_classes) {
            return Err(FitError::LabelOutOfRange { index, n_classes });
        }

        tracing::debug!(
            family = %self,
            samples = samples.nrows(),
            features = samples.ncols(),
            classes = n_classes,
            "fitting learner"
        );

        let model = match self {
            LearnerKind::Knn => TrainedLearner::Knn(knn::fit(samples, labels, n_classes)),
            LearnerKind::Linear => {
                TrainedLearner::Linear(linear::fit(samples, labels, n_classes))
            }
            LearnerKind::AdaBoost => {
                TrainedLearner::AdaBoost(boost::fit(samples, labels, n_classes))
            }
            LearnerKind::Mlp => TrainedLearner::Mlp(mlp::fit(samples, labels, n_classes, seed)),
        };
        Ok(model)
    }
}

impl TrainedLearner {
    pub fn kind(&self) -> LearnerKind {
        match self {
            TrainedLearner::Knn(_) => LearnerKind::Knn,
            TrainedLearner::Linear(_) => LearnerKind::Linear,
            TrainedLearner::AdaBoost(_) => LearnerKind::AdaBoost,
            TrainedLearner::Mlp(_) => LearnerKind::Mlp,
        }
    }

    /// Number of input features the model expects.
    pub fn n_features(&self) -> usize {
        match self {
            TrainedLearner::Knn(m) => m.n_features(),
            TrainedLearner::Linear(m) => m.n_features(),
            TrainedLearner::AdaBoost(m) => m.n_features(),
            TrainedLearner::Mlp(m) => m.n_features(),
        }
    }

    pub fn n_classes(&self) -> usize {
        match self {
            TrainedLearner::Knn(m) => m.n_classes,
            TrainedLearner::Linear(m) => m.n_classes(),
            TrainedLearner::AdaBoost(m) => m.n_classes,
            TrainedLearner::Mlp(m) => m.n_classes(),
        }
    }

    /// Predict the top class and its probability mass for one descriptor.
    pub fn predict_with_confidence(&self, descriptor: &[f32]) -> Prediction {
        let scores = match self {
            TrainedLearner::Knn(m) => m.class_scores(descriptor),
            TrainedLearner::Linear(m) => m.class_scores(descriptor),
            TrainedLearner::AdaBoost(m) => m.class_scores(descriptor),
            TrainedLearner::Mlp(m) => m.class_scores(descriptor),
        };
        top_prediction(&scores)
    }
}

/// Pick the argmax of a normalized score vector.
pub(crate) fn top_prediction(scores: &[f32]) -> Prediction {
    let mut class = 0;
    let mut best = f32::NEG_INFINITY;
    for (i, &s) in scores.iter().enumerate() {
        if s > best {
            best = s;
            class = i;
        }
    }
    Prediction {
        class,
        confidence: best.clamp(0.0, 1.0),
    }
}

/// Numerically-stable softmax.
pub(crate) fn softmax(scores: &mut [f32]) {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    if sum > 0.0 {
        for s in scores.iter_mut() {
            *s /= sum;
        }
    }
}
