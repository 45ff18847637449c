//! Margin-based linear classifier: multinomial softmax regression trained
//! with full-batch gradient descent and L2 regularization.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

// --- Named constants ---
const EPOCHS: usize = 300;
const LEARNING_RATE: f32 = 0.5;
const L2_PENALTY: f32 = 1e-4;

/// Linear model parameters. Stored as plain vectors so the artifact stays a
/// self-describing JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    /// One weight row per class (`n_classes` × `n_features`).
    pub weights: Vec<Vec<f32>>,
    /// One bias per class.
    pub bias: Vec<f32>,
}

pub(super) fn fit(samples: ArrayView2<'_, f32>, labels: &[usize], n_classes: usize) -> LinearModel {
    let n = samples.nrows();
    let d = samples.ncols();

    let mut weights = Array2::<f32>::zeros((n_classes, d));
    let mut bias = Array1::<f32>::zeros(n_classes);

    // One-hot target matrix.
    let mut targets = Array2::<f32>::zeros((n, n_classes));
    for (i, &label) in labels.iter().enumerate() {
        targets[[i, label]] = 1.0;
    }

    let inv_n = 1.0 / n as f32;
    for _ in 0..EPOCHS {
        // Forward: row-wise softmax over logits.
        let mut probs = samples.dot(&weights.t()) + &bias;
        for mut row in probs.rows_mut() {
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let mut sum = 0.0;
            for v in row.iter_mut() {
                *v = (*v - max).exp();
                sum += *v;
            }
            row.mapv_inplace(|v| v / sum);
        }

        // Backward: gradient of mean cross-entropy.
        let delta = &probs - &targets;
        let grad_w = delta.t().dot(&samples) * inv_n + &weights * L2_PENALTY;
        let grad_b = delta.sum_axis(Axis(0)) * inv_n;

        weights = weights - grad_w * LEARNING_RATE;
        bias = bias - grad_b * LEARNING_RATE;
    }

    LinearModel {
        weights: weights.rows().into_iter().map(|r| r.to_vec()).collect(),
        bias: bias.to_vec(),
    }
}

impl LinearModel {
    pub fn n_features(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    pub fn n_classes(&self) -> usize {
        self.weights.len()
    }

    /// Softmax class probabilities for one descriptor.
    pub fn class_scores(&self, descriptor: &[f32]) -> Vec<f32> {
        let mut scores: Vec<f32> = self
            .weights
            .iter()
            .zip(self.bias.iter())
            .map(|(row, &b)| {
                row.iter()
                    .zip(descriptor.iter())
                    .map(|(w, x)| w * x)
                    .sum::<f32>()
                    + b
            })
            .collect();
        super::softmax(&mut scores);
        scores
    }
}
