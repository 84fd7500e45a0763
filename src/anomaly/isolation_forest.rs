//! Isolation Forest anomaly detection
//!
//! Ensemble of randomized binary partition trees. Anomalies sit in sparse
//! regions of feature space and are isolated by fewer random axis-aligned
//! splits than normal points, so a short average path length across the
//! ensemble maps to a high anomaly score.

use crate::anomaly::{AnomalyDetector, Label};
use crate::error::{LoginsightError, Result};
use crate::features::validate_matrix;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Average path length of an unsuccessful search in a random BST of n items.
///
/// c(n) = 2 * (ln(n-1) + gamma) - 2 * (n-1) / n, with c(1) = 0 and c(2) = 1.
fn average_bst_path_length(n: usize) -> f64 {
    if n <= 1 {
        0.0
    } else if n == 2 {
        1.0
    } else {
        let n_f = n as f64;
        2.0 * ((n_f - 1.0).ln() + EULER_GAMMA) - 2.0 * (n_f - 1.0) / n_f
    }
}

/// A single tree node, stored in the tree's arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    /// Internal split: values < threshold go left, >= go right
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Terminal node recording the subset size and creation depth
    Leaf { size: usize, depth: usize },
}

/// Isolation tree over one sub-sample of the training data.
///
/// Nodes live in a flat arena indexed by integer handles; children are built
/// before their parent, so the root is always the last node pushed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<Node>,
    root: usize,
}

impl IsolationTree {
    /// Build a tree over the rows of `x` selected by `indices`.
    pub fn build(
        x: &Array2<f64>,
        indices: &[usize],
        max_depth: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let mut nodes = Vec::new();
        let root = Self::build_node(x, indices, 0, max_depth, rng, &mut nodes);
        Self { nodes, root }
    }

    fn build_node(
        x: &Array2<f64>,
        indices: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut impl Rng,
        nodes: &mut Vec<Node>,
    ) -> usize {
        let n_samples = indices.len();

        if n_samples <= 1 || depth >= max_depth {
            nodes.push(Node::Leaf {
                size: n_samples,
                depth,
            });
            return nodes.len() - 1;
        }

        // Features with a non-degenerate (min < max) range over this subset
        let mut candidates: Vec<(usize, f64, f64)> = Vec::new();
        for feature in 0..x.ncols() {
            let mut min_val = f64::INFINITY;
            let mut max_val = f64::NEG_INFINITY;
            for &i in indices {
                let v = x[[i, feature]];
                min_val = min_val.min(v);
                max_val = max_val.max(v);
            }
            if max_val > min_val {
                candidates.push((feature, min_val, max_val));
            }
        }

        if candidates.is_empty() {
            nodes.push(Node::Leaf {
                size: n_samples,
                depth,
            });
            return nodes.len() - 1;
        }

        let (feature, min_val, max_val) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(min_val..max_val);

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[[i, feature]] < threshold);

        // Threshold landed exactly on the subset minimum
        if left_indices.is_empty() || right_indices.is_empty() {
            nodes.push(Node::Leaf {
                size: n_samples,
                depth,
            });
            return nodes.len() - 1;
        }

        let left = Self::build_node(x, &left_indices, depth + 1, max_depth, rng, nodes);
        let right = Self::build_node(x, &right_indices, depth + 1, max_depth, rng, nodes);

        nodes.push(Node::Split {
            feature,
            threshold,
            left,
            right,
        });
        nodes.len() - 1
    }

    /// Path length for a sample: leaf depth plus the bias correction for the
    /// number of training samples that terminated in that leaf.
    pub fn path_length(&self, sample: &[f64]) -> f64 {
        let mut idx = self.root;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { size, depth } => {
                    return *depth as f64 + average_bst_path_length(*size);
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if sample[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    #[cfg(test)]
    fn n_nodes(&self) -> usize {
        self.nodes.len()
    }
}

/// Isolation Forest anomaly detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Number of trees
    n_estimators: usize,
    /// Sub-sample size per tree; defaults to min(256, n_samples) at fit time
    max_samples: Option<usize>,
    /// Expected proportion of outliers, in (0, 1)
    contamination: f64,
    /// Random seed
    seed: Option<u64>,
    /// Fitted trees
    trees: Option<Vec<IsolationTree>>,
    /// Decision threshold (score >= threshold is an anomaly)
    threshold: Option<f64>,
    /// Effective sub-sample size used at fit time
    sample_size: Option<usize>,
    /// Feature count seen at fit time
    n_features: Option<usize>,
}

impl IsolationForest {
    /// Create a forest with default parameters: 100 trees, sub-sample
    /// min(256, n), contamination 0.05.
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            max_samples: None,
            contamination: 0.05,
            seed: None,
            trees: None,
            threshold: None,
            sample_size: None,
            n_features: None,
        }
    }

    /// Set number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Set sub-sample size per tree
    pub fn with_max_samples(mut self, n: usize) -> Self {
        self.max_samples = Some(n);
        self
    }

    /// Set contamination ratio
    pub fn with_contamination(mut self, c: f64) -> Self {
        self.contamination = c;
        self
    }

    /// Set random seed for reproducible forests
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate_params(&self, n_samples: usize) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(LoginsightError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(s) = self.max_samples {
            if s == 0 || s > n_samples {
                return Err(LoginsightError::InvalidParameter {
                    name: "max_samples".to_string(),
                    value: s.to_string(),
                    reason: format!("must be in 1..={n_samples}"),
                });
            }
        }
        if self.contamination <= 0.0 || self.contamination >= 1.0 {
            return Err(LoginsightError::InvalidParameter {
                name: "contamination".to_string(),
                value: self.contamination.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }
        Ok(())
    }

    fn check_dimensions(&self, x: &Array2<f64>) -> Result<usize> {
        let expected = self.n_features.ok_or(LoginsightError::ModelNotFitted)?;
        if x.ncols() != expected {
            return Err(LoginsightError::DimensionMismatch {
                expected,
                actual: x.ncols(),
            });
        }
        Ok(expected)
    }

    /// Average path length E[h(x)] per sample across the fitted trees.
    pub fn average_path_length(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let trees = self.trees.as_ref().ok_or(LoginsightError::ModelNotFitted)?;
        self.check_dimensions(x)?;
        validate_matrix(x)?;

        let lengths: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample: Vec<f64> = x.row(i).iter().copied().collect();
                trees
                    .iter()
                    .map(|tree| tree.path_length(&sample))
                    .sum::<f64>()
                    / trees.len() as f64
            })
            .collect();

        Ok(Array1::from_vec(lengths))
    }

    /// Anomaly score per sample: s(x) = 2^(-E[h(x)] / c(sample_size)).
    ///
    /// With a sub-sample of one, every tree is a single leaf and c(1) = 0; all
    /// scores are defined as 1.0 in that degenerate case.
    fn compute_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let lengths = self.average_path_length(x)?;
        let c_n = average_bst_path_length(self.sample_size.unwrap_or(256));

        if c_n == 0.0 {
            return Ok(Array1::from_elem(lengths.len(), 1.0));
        }

        Ok(lengths.mapv(|h| 2.0_f64.powf(-h / c_n)))
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector for IsolationForest {
    /// Build the ensemble and calibrate the decision threshold.
    ///
    /// Each tree is grown on a sub-sample drawn uniformly *with replacement*
    /// and bounded to depth ceil(log2(sample_size)). A master RNG seeded from
    /// the configured seed draws one seed per tree; trees are then built in
    /// parallel, each from its own seeded generator, so the resulting forest
    /// is identical for a given seed regardless of worker scheduling.
    ///
    /// The threshold is the round(contamination * n)-th largest training
    /// score, tying the contamination parameter to an exact quantile of the
    /// fit data.
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        validate_matrix(x)?;
        let n_samples = x.nrows();
        self.validate_params(n_samples)?;

        let sample_size = self.max_samples.unwrap_or_else(|| n_samples.min(256));
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let mut master = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let tree_seeds: Vec<u64> = (0..self.n_estimators).map(|_| master.gen()).collect();

        let trees: Vec<IsolationTree> = tree_seeds
            .into_par_iter()
            .map(|tree_seed| {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(tree_seed);
                let indices: Vec<usize> = (0..sample_size)
                    .map(|_| rng.gen_range(0..n_samples))
                    .collect();
                IsolationTree::build(x, &indices, max_depth, &mut rng)
            })
            .collect();

        self.trees = Some(trees);
        self.sample_size = Some(sample_size);
        self.n_features = Some(x.ncols());

        // Calibrate the threshold on the training scores
        let scores = self.compute_scores(x)?;
        let mut sorted: Vec<f64> = scores.iter().copied().collect();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

        let n_anomalies = (self.contamination * n_samples as f64).round() as usize;
        let threshold = if n_anomalies == 0 {
            sorted[0] + f64::EPSILON
        } else {
            sorted[(n_anomalies - 1).min(n_samples - 1)]
        };
        self.threshold = Some(threshold);

        tracing::debug!(
            n_estimators = self.n_estimators,
            sample_size,
            max_depth,
            threshold,
            "isolation forest fitted"
        );

        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.compute_scores(x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<Label>> {
        let threshold = self.threshold.ok_or(LoginsightError::ModelNotFitted)?;
        let scores = self.compute_scores(x)?;

        tracing::debug!(n_samples = x.nrows(), threshold, "classifying samples");

        Ok(scores
            .iter()
            .map(|&s| {
                if s >= threshold {
                    Label::Anomaly
                } else {
                    Label::Normal
                }
            })
            .collect())
    }

    fn threshold(&self) -> f64 {
        self.threshold.unwrap_or(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    /// 20 sessions near (5, 30, 14) plus one wild outlier.
    fn clustered_with_outlier() -> Array2<f64> {
        let mut data = Vec::new();
        for i in 0..20 {
            let jitter = (i % 5) as f64 * 0.3;
            data.push(5.0 + jitter);
            data.push(30.0 - jitter);
            data.push(14.0 + (i % 3) as f64 * 0.5);
        }
        data.extend_from_slice(&[100.0, 200.0, 0.0]);
        Array2::from_shape_vec((21, 3), data).unwrap()
    }

    #[test]
    fn test_outlier_has_highest_score() {
        let x = clustered_with_outlier();

        let mut forest = IsolationForest::new()
            .with_n_estimators(50)
            .with_contamination(0.05)
            .with_seed(42);
        forest.fit(&x).unwrap();

        let scores = forest.score_samples(&x).unwrap();
        let labels = forest.predict(&x).unwrap();

        let outlier_score = scores[20];
        for i in 0..20 {
            assert!(
                outlier_score > scores[i],
                "outlier score {outlier_score} not above sample {i} ({})",
                scores[i]
            );
        }
        assert_eq!(labels[20], Label::Anomaly);
    }

    #[test]
    fn test_threshold_consistency() {
        // round(0.1 * 40) = 4 anomalies expected on the fit set
        let mut data = Vec::new();
        for i in 0..40 {
            data.push(i as f64 * 0.11);
            data.push((i * 7 % 13) as f64);
        }
        let x = Array2::from_shape_vec((40, 2), data).unwrap();

        let mut forest = IsolationForest::new()
            .with_contamination(0.1)
            .with_seed(7);
        let labels = forest.fit_predict(&x).unwrap();

        let n_anomalies = labels.iter().filter(|l| l.is_anomaly()).count() as i64;
        assert!(
            (n_anomalies - 4).abs() <= 1,
            "expected about 4 anomalies, got {n_anomalies}"
        );
    }

    #[test]
    fn test_determinism() {
        let x = clustered_with_outlier();

        let mut a = IsolationForest::new().with_seed(123);
        let mut b = IsolationForest::new().with_seed(123);
        a.fit(&x).unwrap();
        b.fit(&x).unwrap();

        let scores_a = a.score_samples(&x).unwrap();
        let scores_b = b.score_samples(&x).unwrap();
        assert_eq!(scores_a, scores_b);

        // Bit-identical tree structures
        let json_a = serde_json::to_string(&a).unwrap();
        let json_b = serde_json::to_string(&b).unwrap();
        assert_eq!(json_a, json_b);
    }

    #[test]
    fn test_monotonicity_of_scores() {
        let x = clustered_with_outlier();
        let mut forest = IsolationForest::new().with_seed(9);
        forest.fit(&x).unwrap();

        let lengths = forest.average_path_length(&x).unwrap();
        let scores = forest.score_samples(&x).unwrap();

        for i in 0..x.nrows() {
            for j in 0..x.nrows() {
                if lengths[i] < lengths[j] {
                    assert!(scores[i] >= scores[j]);
                }
            }
        }
    }

    #[test]
    fn test_invalid_parameters() {
        let x = arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);

        let mut forest = IsolationForest::new().with_n_estimators(0);
        assert!(matches!(
            forest.fit(&x),
            Err(LoginsightError::InvalidParameter { .. })
        ));

        let mut forest = IsolationForest::new().with_contamination(0.0);
        assert!(matches!(
            forest.fit(&x),
            Err(LoginsightError::InvalidParameter { .. })
        ));

        let mut forest = IsolationForest::new().with_contamination(1.0);
        assert!(matches!(
            forest.fit(&x),
            Err(LoginsightError::InvalidParameter { .. })
        ));

        let mut forest = IsolationForest::new().with_max_samples(10);
        assert!(matches!(
            forest.fit(&x),
            Err(LoginsightError::InvalidParameter { .. })
        ));

        let mut forest = IsolationForest::new().with_max_samples(0);
        assert!(matches!(
            forest.fit(&x),
            Err(LoginsightError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_predict_before_fit() {
        let x = arr2(&[[1.0, 2.0]]);
        let forest = IsolationForest::new();

        assert!(matches!(
            forest.predict(&x),
            Err(LoginsightError::ModelNotFitted)
        ));
        assert!(matches!(
            forest.score_samples(&x),
            Err(LoginsightError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let x = clustered_with_outlier();
        let mut forest = IsolationForest::new().with_seed(1);
        forest.fit(&x).unwrap();

        let narrow = arr2(&[[1.0, 2.0]]);
        match forest.predict(&narrow) {
            Err(LoginsightError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let x = arr2(&[[1.0, f64::NAN], [2.0, 3.0]]);
        let mut forest = IsolationForest::new();
        assert!(matches!(forest.fit(&x), Err(LoginsightError::DataError(_))));
    }

    #[test]
    fn test_single_sample_subsample_is_degenerate() {
        // S = 1 forces max_depth = 0: every tree is a single leaf, every
        // sample gets path length 0 and score 1.0, and the quantile threshold
        // lands at 1.0, labeling everything anomalous.
        let x = arr2(&[
            [1.0, 1.0],
            [2.0, 2.0],
            [3.0, 3.0],
            [4.0, 4.0],
            [5.0, 5.0],
        ]);

        let mut forest = IsolationForest::new()
            .with_max_samples(1)
            .with_contamination(0.2)
            .with_seed(3);
        forest.fit(&x).unwrap();

        let scores = forest.score_samples(&x).unwrap();
        for &s in scores.iter() {
            assert_eq!(s, 1.0);
        }

        let labels = forest.predict(&x).unwrap();
        assert!(labels.iter().all(|l| l.is_anomaly()));
    }

    #[test]
    fn test_degenerate_features_make_leaves() {
        // All rows identical: no feature has a non-degenerate range, so each
        // tree collapses to a single leaf.
        let x = arr2(&[[7.0, 7.0], [7.0, 7.0], [7.0, 7.0], [7.0, 7.0]]);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let tree = IsolationTree::build(&x, &[0, 1, 2, 3], 10, &mut rng);
        assert_eq!(tree.n_nodes(), 1);
    }

    #[test]
    fn test_serde_round_trip_preserves_predictions() {
        let x = clustered_with_outlier();
        let mut forest = IsolationForest::new().with_seed(42);
        forest.fit(&x).unwrap();

        let json = serde_json::to_string(&forest).unwrap();
        let restored: IsolationForest = serde_json::from_str(&json).unwrap();

        assert_eq!(forest.predict(&x).unwrap(), restored.predict(&x).unwrap());
        assert_eq!(
            forest.score_samples(&x).unwrap(),
            restored.score_samples(&x).unwrap()
        );
    }

    #[test]
    fn test_path_length_positive() {
        let x = clustered_with_outlier();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let tree = IsolationTree::build(&x, &indices, 8, &mut rng);

        assert!(tree.path_length(&[5.0, 30.0, 14.0]) > 0.0);
    }
}
