//! Gradient boosted regression trees for binary classification.
//!
//! Binomial deviance loss: the ensemble starts from the prior log-odds, each
//! stage fits a least-squares tree to the residuals `y - p` and sets every
//! leaf to one Newton step `sum(r) / sum(p * (1 - p))`.
//!
//! # Prediction
//!
//! `raw = init + learning_rate * sum(tree(x))`, `p = sigmoid(raw)`.

use analysis_core::{AnalysisError, FeatureVector};

pub const N_FEATURES: usize = FeatureVector::LEN;

pub type FeatureRow = [f64; N_FEATURES];

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// A node of a regression tree, stored in a flat vector; index 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Walk from the root; `<= threshold` goes left.
    pub fn predict(&self, features: &FeatureRow) -> f64 {
        let mut node_idx = 0usize;

        loop {
            match &self.nodes[node_idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node_idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + depth_of(nodes, *left).max(depth_of(nodes, *right))
                }
            }
        }
        depth_of(&self.nodes, 0)
    }
}

struct TreeBuilder<'a> {
    x: &'a [FeatureRow],
    residuals: &'a [f64],
    hessians: &'a [f64],
    params: &'a BoostingParams,
    nodes: Vec<TreeNode>,
}

impl<'a> TreeBuilder<'a> {
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let node_idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { value: 0.0 });

        let split = if depth < self.params.max_depth && indices.len() >= self.params.min_samples_split {
            self.best_split(&indices)
        } else {
            None
        };

        match split {
            Some((feature, threshold)) => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .into_iter()
                    .partition(|&i| self.x[i][feature] <= threshold);
                let left = self.grow(left_idx, depth + 1);
                let right = self.grow(right_idx, depth + 1);
                self.nodes[node_idx] = TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                };
            }
            None => {
                self.nodes[node_idx] = TreeNode::Leaf {
                    value: self.leaf_value(&indices),
                };
            }
        }

        node_idx
    }

    fn leaf_value(&self, indices: &[usize]) -> f64 {
        let numerator: f64 = indices.iter().map(|&i| self.residuals[i]).sum();
        let denominator: f64 = indices.iter().map(|&i| self.hessians[i]).sum();
        if denominator.abs() < 1e-150 {
            0.0
        } else {
            numerator / denominator
        }
    }

    /// Best least-squares split as `(feature, threshold)`. Ties keep the
    /// lower feature index.
    fn best_split(&self, indices: &[usize]) -> Option<(usize, f64)> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        if n < 2 * min_leaf {
            return None;
        }

        let total: f64 = indices.iter().map(|&i| self.residuals[i]).sum();
        let base = total * total / n as f64;

        let mut best: Option<(usize, f64)> = None;
        let mut best_gain = MIN_GAIN;
        let mut sorted = indices.to_vec();

        for feature in 0..N_FEATURES {
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left_sum = 0.0;
            for k in 0..n - 1 {
                left_sum += self.residuals[sorted[k]];
                let n_left = k + 1;
                let n_right = n - n_left;

                let here = self.x[sorted[k]][feature];
                let next = self.x[sorted[k + 1]][feature];
                if here == next || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / n_left as f64
                    + right_sum * right_sum / n_right as f64
                    - base;

                if gain > best_gain {
                    best_gain = gain;
                    let mid = here + (next - here) / 2.0;
                    // Midpoint can round up to `next` for adjacent floats
                    let threshold = if mid < next { mid } else { here };
                    best = Some((feature, threshold));
                }
            }
        }

        best
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[derive(Debug, Clone)]
pub struct GradientBoostedClassifier {
    init_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedClassifier {
    /// Fit on feature rows and boolean labels (`true` = price rose).
    pub fn fit(x: &[FeatureRow], y: &[bool], params: &BoostingParams) -> Result<Self, AnalysisError> {
        if x.len() != y.len() {
            return Err(AnalysisError::InvalidData(format!(
                "{} feature rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(AnalysisError::InsufficientData("no training rows".to_string()));
        }
        if params.n_estimators == 0 || !(params.learning_rate > 0.0) {
            return Err(AnalysisError::InvalidData(
                "n_estimators and learning_rate must be positive".to_string(),
            ));
        }
        if x.iter().flatten().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidData("non-finite feature value".to_string()));
        }

        let targets: Vec<f64> = y.iter().map(|&up| if up { 1.0 } else { 0.0 }).collect();
        let positives = targets.iter().sum::<f64>();
        if positives == 0.0 || positives == targets.len() as f64 {
            return Err(AnalysisError::InsufficientData(
                "training labels contain a single class".to_string(),
            ));
        }

        let prior = positives / targets.len() as f64;
        let init_score = (prior / (1.0 - prior)).ln();

        let mut raw = vec![init_score; x.len()];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut residuals = vec![0.0; x.len()];
        let mut hessians = vec![0.0; x.len()];

        for _ in 0..params.n_estimators {
            for i in 0..x.len() {
                let p = sigmoid(raw[i]);
                residuals[i] = targets[i] - p;
                hessians[i] = p * (1.0 - p);
            }

            let mut builder = TreeBuilder {
                x,
                residuals: &residuals,
                hessians: &hessians,
                params,
                nodes: Vec::new(),
            };
            builder.grow((0..x.len()).collect(), 0);
            let tree = RegressionTree { nodes: builder.nodes };

            for (i, row) in x.iter().enumerate() {
                raw[i] += params.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        Ok(Self {
            init_score,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    pub fn raw_score(&self, features: &FeatureRow) -> f64 {
        self.init_score
            + self.learning_rate * self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
    }

    /// Probability of the "price rises" class.
    pub fn predict_proba(&self, features: &FeatureRow) -> f64 {
        sigmoid(self.raw_score(features))
    }

    pub fn predict_up_probability(&self, features: &FeatureVector) -> f64 {
        self.predict_proba(&features.as_array())
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}
