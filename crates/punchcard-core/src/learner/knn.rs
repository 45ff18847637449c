//! Distance-weighted k-nearest-neighbor classifier.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

// --- Named constants ---
const NEIGHBORS: usize = 3;
const DISTANCE_EPS: f32 = 1e-6;

/// Nearest-neighbor model: the training set is the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnModel {
    pub k: usize,
    /// Reference samples, one row per training descriptor.
    pub samples: Vec<Vec<f32>>,
    /// Class index per reference sample.
    pub labels: Vec<usize>,
    pub n_classes: usize,
}

pub(super) fn fit(samples: ArrayView2<'_, f32>, labels: &[usize], n_classes: usize) -> KnnModel {
    KnnModel {
        k: NEIGHBORS.min(samples.nrows()),
        samples: samples.rows().into_iter().map(|r| r.to_vec()).collect(),
        labels: labels.to_vec(),
        n_classes,
    }
}

impl KnnModel {
    pub fn n_features(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    /// Per-class probability mass from inverse-distance-weighted votes of
    /// the k nearest reference samples.
    pub fn class_scores(&self, descriptor: &[f32]) -> Vec<f32> {
        let mut distances: Vec<(f32, usize)> = self
            .samples
            .iter()
            .zip(self.labels.iter())
            .map(|(s, &label)| (euclidean(s, descriptor), label))
            .collect();
        distances
            .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut scores = vec![0.0f32; self.n_classes];
        let mut total = 0.0f32;
        for &(dist, label) in distances.iter().take(self.k) {
            let weight = 1.0 / (dist + DISTANCE_EPS);
            scores[label] += weight;
            total += weight;
        }
        if total > 0.0 {
            for s in &mut scores {
                *s /= total;
            }
        }
        scores
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}
