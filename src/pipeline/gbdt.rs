//! Gradient boosted regression trees.
//!
//! Squared error boosting with second order leaf weights, exact greedy split
//! search and a learned default direction for missing (NaN) feature values,
//! so numeric features do not need imputation upstream. Row and column
//! subsampling are drawn from a seeded generator, and split search over
//! candidate features runs on the rayon pool with a deterministic reduction:
//! the same seed and data always give the same ensemble.

use super::{Estimator, FittedEstimator};
use crate::error::{ForecastError, Result};
use ndarray::{ArrayView1, ArrayView2};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Minimum gain for a split to be kept.
const MIN_SPLIT_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtParams {
    /// Number of boosting rounds
    pub n_estimators: usize,
    pub max_depth: usize,
    /// Shrinkage applied to every leaf weight
    pub learning_rate: f64,
    /// Fraction of the rows drawn for each tree
    pub subsample: f64,
    /// Fraction of the features drawn for each tree
    pub colsample_bytree: f64,
    /// L2 regularisation on leaf weights
    pub reg_lambda: f64,
    /// Minimum hessian sum on each side of a split
    pub min_child_weight: f64,
    pub seed: u64,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: 6,
            learning_rate: 0.05,
            subsample: 0.8,
            colsample_bytree: 0.8,
            reg_lambda: 1.0,
            min_child_weight: 1.0,
            seed: 42,
        }
    }
}

impl GbdtParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ForecastError::invalid_config("n_estimators must be at least 1"));
        }
        if self.max_depth == 0 {
            return Err(ForecastError::invalid_config("max_depth must be at least 1"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ForecastError::invalid_config("learning_rate must be positive"));
        }
        for (name, fraction) in [
            ("subsample", self.subsample),
            ("colsample_bytree", self.colsample_bytree),
        ] {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(ForecastError::invalid_config(format!(
                    "{} must be in (0, 1], got {}",
                    name, fraction
                )));
            }
        }
        if self.reg_lambda < 0.0 || self.min_child_weight < 0.0 {
            return Err(ForecastError::invalid_config(
                "reg_lambda and min_child_weight must not be negative",
            ));
        }
        Ok(())
    }
}

/// Unfitted regressor, holding its hyperparameters.
#[derive(Debug, Clone, Default)]
pub struct GradientBoostedRegressor {
    params: GbdtParams,
}

impl GradientBoostedRegressor {
    pub fn new(params: GbdtParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GbdtParams {
        &self.params
    }
}

impl Estimator for GradientBoostedRegressor {
    type Fitted = GradientBoostedTrees;

    fn fit(&self, x: ArrayView2<f64>, y: &[f64]) -> Result<GradientBoostedTrees> {
        let params = &self.params;
        params.validate()?;
        if x.nrows() != y.len() {
            return Err(ForecastError::LengthMismatch {
                column: "target".to_string(),
                expected: x.nrows(),
                found: y.len(),
            });
        }

        let labelled = (0..y.len())
            .filter(|&row| y[row].is_finite())
            .collect::<Vec<_>>();
        if labelled.is_empty() {
            return Err(ForecastError::NoRows(
                "no training row has a finite target".to_string(),
            ));
        }

        let n_features = x.ncols();
        let base_score = labelled.iter().map(|&row| y[row]).sum::<f64>() / labelled.len() as f64;
        let mut predictions = vec![base_score; y.len()];
        let mut gradients = vec![0.0; y.len()];
        let hessians = vec![1.0; y.len()];

        let n_sampled_rows = fraction_of(labelled.len(), params.subsample);
        let n_sampled_features = fraction_of(n_features, params.colsample_bytree);
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut row_pool = labelled.clone();
        let mut feature_pool = (0..n_features).collect::<Vec<_>>();
        let mut trees = Vec::with_capacity(params.n_estimators);

        debug!(
            "Boosting {} trees on {} rows and {} features",
            params.n_estimators,
            labelled.len(),
            n_features
        );

        for round in 0..params.n_estimators {
            for &row in &labelled {
                gradients[row] = predictions[row] - y[row];
            }

            row_pool.shuffle(&mut rng);
            let mut rows = row_pool[..n_sampled_rows].to_vec();
            rows.sort_unstable();

            feature_pool.shuffle(&mut rng);
            let mut features = feature_pool[..n_sampled_features].to_vec();
            features.sort_unstable();

            let tree = TreeBuilder {
                x: x.view(),
                gradients: &gradients,
                hessians: &hessians,
                features: &features,
                params,
            }
            .build(rows);

            for &row in &labelled {
                predictions[row] += tree.predict_row(x.row(row));
            }
            trees.push(tree);

            if (round + 1) % 50 == 0 {
                let mse = labelled
                    .iter()
                    .map(|&row| (predictions[row] - y[row]).powi(2))
                    .sum::<f64>()
                    / labelled.len() as f64;
                trace!("Round {}: training rmse {:.6}", round + 1, mse.sqrt());
            }
        }

        Ok(GradientBoostedTrees {
            base_score,
            n_features,
            trees,
        })
    }
}

fn fraction_of(total: usize, fraction: f64) -> usize {
    if total == 0 {
        return 0;
    }
    ((total as f64 * fraction).ceil() as usize).clamp(1, total)
}

/// Fitted additive tree ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    base_score: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.base_score
            + self
                .trees
                .iter()
                .map(|tree| tree.predict_row(row))
                .sum::<f64>()
    }
}

impl FittedEstimator for GradientBoostedTrees {
    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<f64>> {
        if x.ncols() != self.n_features {
            return Err(ForecastError::ShapeMismatch {
                expected: self.n_features,
                found: x.ncols(),
            });
        }
        Ok((0..x.nrows())
            .into_par_iter()
            .map(|row| self.predict_row(x.row(row)))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Split {
        feature: usize,
        /// Rows with a value strictly below go left
        threshold: f64,
        /// Where missing values go
        default_left: bool,
        left: usize,
        right: usize,
    },
    Leaf {
        weight: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { weight } => return *weight,
                TreeNode::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                } => {
                    let value = row[*feature];
                    let go_left = if value.is_nan() {
                        *default_left
                    } else {
                        value < *threshold
                    };
                    index = if go_left { *left } else { *right };
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    default_left: bool,
    gain: f64,
}

struct TreeBuilder<'a> {
    x: ArrayView2<'a, f64>,
    gradients: &'a [f64],
    hessians: &'a [f64],
    features: &'a [usize],
    params: &'a GbdtParams,
}

impl TreeBuilder<'_> {
    fn build(&self, rows: Vec<usize>) -> RegressionTree {
        let mut nodes = Vec::new();
        self.grow(rows, 0, &mut nodes);
        RegressionTree { nodes }
    }

    fn grow(&self, rows: Vec<usize>, depth: usize, nodes: &mut Vec<TreeNode>) -> usize {
        let gradient_sum = rows.iter().map(|&row| self.gradients[row]).sum::<f64>();
        let hessian_sum = rows.iter().map(|&row| self.hessians[row]).sum::<f64>();

        if depth < self.params.max_depth && rows.len() >= 2 {
            if let Some(split) = self.best_split(&rows, gradient_sum, hessian_sum) {
                let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                    rows.iter().partition(|&&row| {
                        let value = self.x[[row, split.feature]];
                        if value.is_nan() {
                            split.default_left
                        } else {
                            value < split.threshold
                        }
                    });

                let index = nodes.len();
                nodes.push(TreeNode::Leaf { weight: 0.0 });
                let left = self.grow(left_rows, depth + 1, nodes);
                let right = self.grow(right_rows, depth + 1, nodes);
                nodes[index] = TreeNode::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    default_left: split.default_left,
                    left,
                    right,
                };
                return index;
            }
        }

        let weight =
            -gradient_sum / (hessian_sum + self.params.reg_lambda) * self.params.learning_rate;
        nodes.push(TreeNode::Leaf { weight });
        nodes.len() - 1
    }

    fn best_split(
        &self,
        rows: &[usize],
        gradient_sum: f64,
        hessian_sum: f64,
    ) -> Option<SplitCandidate> {
        let candidates = self
            .features
            .par_iter()
            .map(|&feature| self.best_split_for_feature(feature, rows, gradient_sum, hessian_sum))
            .collect::<Vec<_>>();

        // Sequential reduction keeps ties on the lowest feature index
        candidates
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, candidate| match best {
                Some(best) if best.gain >= candidate.gain => Some(best),
                _ => Some(candidate),
            })
    }

    fn score(&self, gradient: f64, hessian: f64) -> f64 {
        gradient * gradient / (hessian + self.params.reg_lambda)
    }

    fn best_split_for_feature(
        &self,
        feature: usize,
        rows: &[usize],
        gradient_sum: f64,
        hessian_sum: f64,
    ) -> Option<SplitCandidate> {
        let mut present = Vec::with_capacity(rows.len());
        let mut missing_gradient = 0.0;
        let mut missing_hessian = 0.0;
        for &row in rows {
            let value = self.x[[row, feature]];
            if value.is_nan() {
                missing_gradient += self.gradients[row];
                missing_hessian += self.hessians[row];
            } else {
                present.push((value, self.gradients[row], self.hessians[row]));
            }
        }
        if present.len() < 2 {
            return None;
        }
        present.sort_by(|a, b| a.0.total_cmp(&b.0));

        let parent_score = self.score(gradient_sum, hessian_sum);
        let min_child_weight = self.params.min_child_weight;
        let mut best: Option<SplitCandidate> = None;
        let mut left_gradient = 0.0;
        let mut left_hessian = 0.0;

        for window in 0..present.len() - 1 {
            let (value, gradient, hessian) = present[window];
            left_gradient += gradient;
            left_hessian += hessian;
            let next_value = present[window + 1].0;
            if next_value <= value {
                continue;
            }

            let mut threshold = value + (next_value - value) / 2.0;
            if threshold <= value {
                threshold = next_value;
            }

            for default_left in [true, false] {
                let (g_left, h_left) = if default_left {
                    (left_gradient + missing_gradient, left_hessian + missing_hessian)
                } else {
                    (left_gradient, left_hessian)
                };
                let g_right = gradient_sum - g_left;
                let h_right = hessian_sum - h_left;
                if h_left < min_child_weight || h_right < min_child_weight {
                    continue;
                }
                let gain = self.score(g_left, h_left) + self.score(g_right, h_right) - parent_score;
                if gain > MIN_SPLIT_GAIN && best.is_none_or(|best| gain > best.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        default_left,
                        gain,
                    });
                }
            }
        }

        best
    }
}
