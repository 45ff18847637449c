//! Shallow feed-forward network: one ReLU hidden layer, softmax output,
//! trained with full-batch gradient descent on cross-entropy loss.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// --- Named constants ---
const HIDDEN_UNITS: usize = 100;
const ITERATIONS: usize = 500;
const LEARNING_RATE: f32 = 0.05;

/// Network parameters, stored as plain vectors for the JSON artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpModel {
    /// Hidden weights (`hidden` × `n_features`).
    pub w1: Vec<Vec<f32>>,
    pub b1: Vec<f32>,
    /// Output weights (`n_classes` × `hidden`).
    pub w2: Vec<Vec<f32>>,
    pub b2: Vec<f32>,
}

pub(super) fn fit(
    samples: ArrayView2<'_, f32>,
    labels: &[usize],
    n_classes: usize,
    seed: u64,
) -> MlpModel {
    let n = samples.nrows();
    let d = samples.ncols();
    let hidden = HIDDEN_UNITS;

    // He initialization for the ReLU layer, deterministic for a fixed seed.
    let mut rng = StdRng::seed_from_u64(seed);
    let scale1 = (2.0 / d as f32).sqrt();
    let scale2 = (2.0 / hidden as f32).sqrt();
    let mut w1 = Array2::from_shape_fn((hidden, d), |_| rng.gen_range(-1.0f32..1.0) * scale1);
    let mut b1 = Array1::<f32>::zeros(hidden);
    let mut w2 =
        Array2::from_shape_fn((n_classes, hidden), |_| rng.gen_range(-1.0f32..1.0) * scale2);
    let mut b2 = Array1::<f32>::zeros(n_classes);

    let mut targets = Array2::<f32>::zeros((n, n_classes));
    for (i, &label) in labels.iter().enumerate() {
        targets[[i, label]] = 1.0;
    }

    let inv_n = 1.0 / n as f32;
    for _ in 0..ITERATIONS {
        // Forward.
        let pre_hidden = samples.dot(&w1.t()) + &b1;
        let activations = pre_hidden.mapv(|v| v.max(0.0));
        let mut probs = activations.dot(&w2.t()) + &b2;
        for mut row in probs.rows_mut() {
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let mut sum = 0.0;
            for v in row.iter_mut() {
                *v = (*v - max).exp();
                sum += *v;
            }
            row.mapv_inplace(|v| v / sum);
        }

        // Backward.
        let delta_out = &probs - &targets;
        let grad_w2 = delta_out.t().dot(&activations) * inv_n;
        let grad_b2 = delta_out.sum_axis(Axis(0)) * inv_n;

        let mut delta_hidden = delta_out.dot(&w2);
        delta_hidden.zip_mut_with(&pre_hidden, |dh, &pre| {
            if pre <= 0.0 {
                *dh = 0.0;
            }
        });
        let grad_w1 = delta_hidden.t().dot(&samples) * inv_n;
        let grad_b1 = delta_hidden.sum_axis(Axis(0)) * inv_n;

        w2 = w2 - grad_w2 * LEARNING_RATE;
        b2 = b2 - grad_b2 * LEARNING_RATE;
        w1 = w1 - grad_w1 * LEARNING_RATE;
        b1 = b1 - grad_b1 * LEARNING_RATE;
    }

    MlpModel {
        w1: w1.rows().into_iter().map(|r| r.to_vec()).collect(),
        b1: b1.to_vec(),
        w2: w2.rows().into_iter().map(|r| r.to_vec()).collect(),
        b2: b2.to_vec(),
    }
}

impl MlpModel {
    pub fn n_features(&self) -> usize {
        self.w1.first().map_or(0, Vec::len)
    }

    pub fn n_classes(&self) -> usize {
        self.w2.len()
    }

    /// Softmax class probabilities for one descriptor.
    pub fn class_scores(&self, descriptor: &[f32]) -> Vec<f32> {
        let hidden: Vec<f32> = self
            .w1
            .iter()
            .zip(self.b1.iter())
            .map(|(row, &b)| {
                (row.iter()
                    .zip(descriptor.iter())
                    .map(|(w, x)| w * x)
                    .sum::<f32>()
                    + b)
                    .max(0.0)
            })
            .collect();

        let mut scores: Vec<f32> = self
            .w2
            .iter()
            .zip(self.b2.iter())
            .map(|(row, &b)| {
                row.iter()
                    .zip(hidden.iter())
                    .map(|(w, h)| w * h)
                    .sum::<f32>()
                    + b
            })
            .collect();
        super::softmax(&mut scores);
        scores
    }
}
