//! CART regression tree on the mean-squared-error criterion.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Nodes whose target variance is below this are not split.
const MIN_IMPURITY: f64 = 1e-12;

/// Growth limits of a single tree, resolved from the forest parameters.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeLimits {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree stored as a flat node arena; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grow a tree on the `samples` rows of `x` (duplicates allowed, as in a
    /// bootstrap sample).
    ///
    /// Returns the tree and the total impurity decrease credited to each
    /// feature.
    pub(crate) fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        samples: Vec<usize>,
        limits: TreeLimits,
        rng: &mut StdRng,
    ) -> (Self, Vec<f64>) {
        let n_features = x.first().map_or(0, Vec::len);
        let mut grower = Grower {
            x,
            y,
            limits,
            n_features,
            rng,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        grower.grow(samples, 0);

        (
            Self {
                nodes: grower.nodes,
            },
            grower.importances,
        )
    }

    /// Predict one row. Rows narrower than the training matrix read missing
    /// features as 0.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }

    /// Depth of the deepest leaf; a single leaf has depth 0.
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Candidate split found for a node.
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Sum of squared errors of both children.
    child_sse: f64,
}

struct Grower<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    limits: TreeLimits,
    n_features: usize,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl Grower<'_> {
    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let n = samples.len();
        let (sum, sum_sq) = samples.iter().fold((0.0, 0.0), |(s, sq), &i| {
            (s + self.y[i], sq + self.y[i] * self.y[i])
        });
        let mean = if n == 0 { 0.0 } else { sum / n as f64 };
        let sse = (sum_sq - sum * mean).max(0.0);

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });

        let splittable = n >= self.limits.min_samples_split
            && n >= 2 * self.limits.min_samples_leaf
            && self.limits.max_depth.is_none_or(|max| depth < max)
            && n > 0
            && sse / n as f64 > MIN_IMPURITY;
        if !splittable {
            return idx;
        }

        let Some(split) = self.best_split(&samples, sum) else {
            return idx;
        };
        self.importances[split.feature] += sse - split.child_sse;

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);

        let left = self.grow(left_samples, depth + 1);
        let right = self.grow(right_samples, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        if self.limits.max_features >= self.n_features {
            return (0..self.n_features).collect();
        }
        let mut features =
            rand::seq::index::sample(&mut *self.rng, self.n_features, self.limits.max_features)
                .into_vec();
        features.sort_unstable();
        features
    }

    /// Best split by sweeping each candidate feature in sorted order.
    ///
    /// Maximizing `sum_l^2 / n_l + sum_r^2 / n_r` minimizes the children's
    /// squared error. Ties keep the first candidate found.
    fn best_split(&mut self, samples: &[usize], sum: f64) -> Option<SplitCandidate> {
        let n = samples.len();
        let min_leaf = self.limits.min_samples_leaf;
        let sum_sq: f64 = samples.iter().map(|&i| self.y[i] * self.y[i]).sum();

        let mut best: Option<(f64, usize, f64)> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in self.candidate_features() {
            pairs.clear();
            pairs.extend(samples.iter().map(|&i| (self.x[i][feature], self.y[i])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            for k in 0..n - 1 {
                left_sum += pairs[k].1;
                let left_n = k + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }
                let (value, next) = (pairs[k].0, pairs[k + 1].0);
                if next <= value {
                    continue;
                }

                let right_sum = sum - left_sum;
                let score =
                    left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64;
                if best.is_none_or(|(best_score, _, _)| score > best_score) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some((score, feature, threshold));
                }
            }
        }

        best.map(|(score, feature, threshold)| SplitCandidate {
            feature,
            threshold,
            child_sse: (sum_sq - score).max(0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn limits() -> TreeLimits {
        TreeLimits {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: usize::MAX,
        }
    }

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 0.0]).collect();
        let y: Vec<f64> = (0..10).map(|i| if i < 5 { 10.0 } else { 20.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_fits_step_function_with_one_split() {
        let (x, y) = step_data();
        let mut rng = StdRng::seed_from_u64(1);
        let (tree, importances) = RegressionTree::fit(&x, &y, (0..10).collect(), limits(), &mut rng);

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict(&[2.0, 0.0]), 10.0);
        assert_eq!(tree.predict(&[4.5, 0.0]), 10.0);
        assert_eq!(tree.predict(&[4.6, 0.0]), 20.0);
        assert!(importances[0] > 0.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_constant_target_is_a_single_leaf() {
        let x: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64]).collect();
        let y = vec![7.0; 5];
        let mut rng = StdRng::seed_from_u64(1);
        let (tree, _) = RegressionTree::fit(&x, &y, (0..5).collect(), limits(), &mut rng);

        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict(&[100.0]), 7.0);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x: Vec<Vec<f64>> = (0..32).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..32).map(|i| (i * i) as f64).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let limits = TreeLimits {
            max_depth: Some(3),
            ..limits()
        };
        let (tree, _) = RegressionTree::fit(&x, &y, (0..32).collect(), limits, &mut rng);

        assert_eq!(tree.depth(), 3);
        assert!(tree.n_leaves() <= 8);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let (x, y) = step_data();
        let mut rng = StdRng::seed_from_u64(1);
        let limits = TreeLimits {
            min_samples_leaf: 6,
            ..limits()
        };
        let (tree, _) = RegressionTree::fit(&x, &y, (0..10).collect(), limits, &mut rng);

        // No split can leave six rows on both sides of ten.
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict(&[0.0, 0.0]), 15.0);
    }

    #[test]
    fn test_duplicate_feature_values_are_not_separated() {
        let x = vec![vec![1.0], vec![1.0], vec![2.0], vec![2.0]];
        let y = vec![1.0, 3.0, 10.0, 12.0];
        let mut rng = StdRng::seed_from_u64(1);
        let (tree, _) = RegressionTree::fit(&x, &y, (0..4).collect(), limits(), &mut rng);

        assert_eq!(tree.predict(&[1.0]), 2.0);
        assert_eq!(tree.predict(&[2.0]), 11.0);
    }
}
