//! Ensemble of weak learners: multi-class AdaBoost (SAMME) over depth-1
//! decision stumps.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

// --- Named constants ---
const ROUNDS: usize = 50;
const MIN_ERROR: f32 = 1e-10;

/// A depth-1 decision stump: one feature, one threshold, one class per side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stump {
    pub feature: usize,
    pub threshold: f32,
    /// Predicted class for `value < threshold`.
    pub below: usize,
    /// Predicted class for `value >= threshold`.
    pub above: usize,
}

impl Stump {
    fn predict(&self, descriptor: &[f32]) -> usize {
        match descriptor.get(self.feature) {
            Some(&v) if v < self.threshold => self.below,
            _ => self.above,
        }
    }
}

/// Boosted stump ensemble with per-stump weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostModel {
    pub stumps: Vec<Stump>,
    pub alphas: Vec<f32>,
    pub n_classes: usize,
    pub n_features: usize,
}

pub(super) fn fit(samples: ArrayView2<'_, f32>, labels: &[usize], n_classes: usize) -> BoostModel {
    let n = samples.nrows();
    let d = samples.ncols();

    let mut weights = vec![1.0f32 / n as f32; n];
    let mut stumps = Vec::new();
    let mut alphas = Vec::new();

    // SAMME: a weak learner only has to beat random guessing over C classes.
    let random_error = 1.0 - 1.0 / n_classes as f32;

    for _ in 0..ROUNDS {
        let (stump, error) = best_stump(samples, labels, &weights, n_classes, d);

        if error >= random_error {
            break;
        }
        let error = error.max(MIN_ERROR);
        let alpha = ((1.0 - error) / error).ln() + (n_classes as f32 - 1.0).ln();

        // Re-weight: misclassified samples gain, then renormalize.
        let mut total = 0.0f32;
        for i in 0..n {
            let row: Vec<f32> = samples.row(i).to_vec();
            if stump.predict(&row) != labels[i] {
                weights[i] *= alpha.exp();
            }
            total += weights[i];
        }
        for w in &mut weights {
            *w /= total;
        }

        let perfect = error <= MIN_ERROR;
        stumps.push(stump);
        alphas.push(alpha);
        if perfect {
            break;
        }
    }

    BoostModel {
        stumps,
        alphas,
        n_classes,
        n_features: d,
    }
}

/// Exhaustive weighted search for the stump with minimal weighted error.
fn best_stump(
    samples: ArrayView2<'_, f32>,
    labels: &[usize],
    weights: &[f32],
    n_classes: usize,
    n_features: usize,
) -> (Stump, f32) {
    let n = samples.nrows();
    let total_weight: f32 = weights.iter().sum();

    let mut best = Stump {
        feature: 0,
        threshold: 0.0,
        below: 0,
        above: 0,
    };
    let mut best_error = f32::INFINITY;

    let mut order: Vec<usize> = (0..n).collect();

    for feature in 0..n_features {
        let column = samples.column(feature);
        order.sort_by(|&a, &b| {
            column[a]
                .partial_cmp(&column[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Class-weight mass on each side of the split; start with everything
        // on the right and sweep samples across.
        let mut left = vec![0.0f32; n_classes];
        let mut right = vec![0.0f32; n_classes];
        for i in 0..n {
            right[labels[i]] += weights[i];
        }

        for cut in 0..n {
            let idx = order[cut];
            left[labels[idx]] += weights[idx];
            right[labels[idx]] -= weights[idx];

            // No split between equal values.
            if cut + 1 < n && column[order[cut + 1]] <= column[idx] {
                continue;
            }
            if cut + 1 == n {
                break;
            }

            let (below, below_mass) = arg_max(&left);
            let (above, above_mass) = arg_max(&right);
            let error = total_weight - below_mass - above_mass;

            if error < best_error {
                best_error = error;
                best = Stump {
                    feature,
                    threshold: (column[idx] + column[order[cut + 1]]) / 2.0,
                    below,
                    above,
                };
            }
        }
    }

    (best, best_error)
}

fn arg_max(values: &[f32]) -> (usize, f32) {
    let mut idx = 0;
    let mut best = f32::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best {
            best = v;
            idx = i;
        }
    }
    (idx, best)
}

impl BoostModel {
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Normalized weighted-vote share per class.
    pub fn class_scores(&self, descriptor: &[f32]) -> Vec<f32> {
        let mut scores = vec![0.0f32; self.n_classes];
        let mut total = 0.0f32;
        for (stump, &alpha) in self.stumps.iter().zip(self.alphas.iter()) {
            scores[stump.predict(descriptor)] += alpha;
            total += alpha;
        }
        if total > 0.0 {
            for s in &mut scores {
                *s /= total;
            }
        }
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learner::test_data::two_clusters;
    use ndarray::Array2;

    #[test]
    fn test_single_stump_separates_1d_split() {
        let rows = vec![0.1, 0.2, 0.3, 0.7, 0.8, 0.9];
        let samples = Array2::from_shape_vec((6, 1), rows).unwrap();
        let labels = vec![0, 0, 0, 1, 1, 1];
        let model = fit(samples.view(), &labels, 2);
        assert!(!model.stumps.is_empty());

        let low = model.class_scores(&[0.15]);
        let high = model.class_scores(&[0.85]);
        assert!(low[0] > low[1], "{low:?}");
        assert!(high[1] > high[0], "{high:?}");
    }

    #[test]
    fn test_fit_separates_clusters() {
        let (samples, labels) = two_clusters(10);
        let model = fit(samples.view(), &labels, 2);
        let a = model.class_scores(&[1.0, 0.9, 0.0, 0.1]);
        let b = model.class_scores(&[0.0, 0.1, 1.0, 0.9]);
        assert!(a[0] > 0.5, "{a:?}");
        assert!(b[1] > 0.5, "{b:?}");
    }

    #[test]
    fn test_scores_normalized() {
        let (samples, labels) = two_clusters(5);
        let model = fit(samples.view(), &labels, 2);
        let scores = model.class_scores(&[0.5, 0.5, 0.5, 0.5]);
        let sum: f32 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_stump_predict_sides() {
        let stump = Stump {
            feature: 1,
            threshold: 0.5,
            below: 0,
            above: 1,
        };
        assert_eq!(stump.predict(&[9.0, 0.2]), 0);
        assert_eq!(stump.predict(&[9.0, 0.7]), 1);
        // Missing feature falls through to the `above` side.
        assert_eq!(stump.predict(&[9.0]), 1);
    }

    #[test]
    fn test_perfect_split_stops_early() {
        let rows = vec![0.0, 0.0, 1.0, 1.0];
        let samples = Array2::from_shape_vec((4, 1), rows).unwrap();
        let labels = vec![0, 0, 1, 1];
        let model = fit(samples.view(), &labels, 2);
        // One stump is enough; boosting stops instead of looping all rounds.
        assert_eq!(model.stumps.len(), 1);
    }
}
