//! Isolation forest.
//!
//! Each tree isolates points by recursive random axis-aligned splits on a
//! random sub-sample. Anomalies isolate in fewer splits, so the score
//! `2^(-E[h(x)] / c(psi))` approaches 1 for outliers and sits near or below
//! 0.5 for ordinary points.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

const EULER_GAMMA: f64 = 0.577_215_664_9;

#[derive(Debug, Clone)]
enum IsolationNode {
    Internal {
        split_feature: usize,
        split_value: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    Leaf {
        size: usize,
    },
}

impl IsolationNode {
    fn build(data: &[&[f64]], rng: &mut StdRng, height_limit: usize, height: usize) -> Self {
        if height >= height_limit || data.len() <= 1 {
            return IsolationNode::Leaf { size: data.len() };
        }

        // Only features that still vary inside this partition can split it.
        let dims = data[0].len();
        let splittable: Vec<(usize, f64, f64)> = (0..dims)
            .filter_map(|f| {
                let (min, max) = data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                    (lo.min(p[f]), hi.max(p[f]))
                });
                (max > min).then_some((f, min, max))
            })
            .collect();
        if splittable.is_empty() {
            return IsolationNode::Leaf { size: data.len() };
        }

        let (split_feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
        let split_value = rng.gen_range(min..max);

        let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
            data.iter().copied().partition(|p| p[split_feature] < split_value);

        IsolationNode::Internal {
            split_feature,
            split_value,
            left: Box::new(Self::build(&left, rng, height_limit, height + 1)),
            right: Box::new(Self::build(&right, rng, height_limit, height + 1)),
        }
    }

    fn path_length(&self, point: &[f64], height: usize) -> f64 {
        match self {
            IsolationNode::Leaf { size } => height as f64 + average_path_length(*size),
            IsolationNode::Internal {
                split_feature,
                split_value,
                left,
                right,
            } => {
                let value = point.get(*split_feature).copied().unwrap_or(0.0);
                if value < *split_value {
                    left.path_length(point, height + 1)
                } else {
                    right.path_length(point, height + 1)
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// A fitted forest.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationNode>,
    sample_size: usize,
}

impl IsolationForest {
    /// Fit `trees` trees, each on a sub-sample of `min(sample_size, len)`
    /// points. The same `seed` and data give the same forest.
    pub fn fit(data: &[Vec<f64>], trees: usize, sample_size: usize, seed: u64) -> Self {
        let sample_size = sample_size.min(data.len()).max(1);
        let height_limit = (sample_size as f64).log2().ceil().max(1.0) as usize;

        let trees = (0..trees.max(1))
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                let subset: Vec<&[f64]> = if data.is_empty() {
                    Vec::new()
                } else {
                    sample(&mut rng, data.len(), sample_size)
                        .into_iter()
                        .map(|j| data[j].as_slice())
                        .collect()
                };
                IsolationNode::build(&subset, &mut rng, height_limit, 0)
            })
            .collect();

        Self { trees, sample_size }
    }

    pub fn score(&self, point: &[f64]) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(point, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        let c = average_path_length(self.sample_size);
        if c == 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / c)
    }

    /// Score every point in parallel, preserving order.
    pub fn score_all(&self, data: &[Vec<f64>]) -> Vec<f64> {
        data.par_iter().map(|p| self.score(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_outlier() -> Vec<Vec<f64>> {
        let mut data: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![10.0 + (i % 5) as f64 * 0.1, 20.0 + (i % 7) as f64 * 0.1])
            .collect();
        data.push(vec![95.0, -40.0]);
        data
    }

    #[test]
    fn outlier_scores_highest() {
        let data = cluster_with_outlier();
        let forest = IsolationForest::fit(&data, 200, 64, 7);
        let scores = forest.score_all(&data);
        let outlier = *scores.last().unwrap();
        let max_inlier = scores[..scores.len() - 1]
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(outlier > max_inlier, "outlier {outlier} vs inlier {max_inlier}");
        assert!(outlier > 0.6);
    }

    #[test]
    fn same_seed_same_scores() {
        let data = cluster_with_outlier();
        let a = IsolationForest::fit(&data, 50, 32, 42).score_all(&data);
        let b = IsolationForest::fit(&data, 50, 32, 42).score_all(&data);
        assert_eq!(a, b);
    }

    #[test]
    fn identical_points_score_identically() {
        let data = vec![vec![1.0, 2.0, 3.0]; 30];
        let scores = IsolationForest::fit(&data, 100, 256, 1).score_all(&data);
        assert!(scores.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn average_path_length_values() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.24).abs() < 0.05, "c(256) = {c256}");
    }
}
