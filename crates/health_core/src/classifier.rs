//! Probabilistic classifiers exported from the training environment
//!
//! Two model families are understood:
//! - `logistic_regression`: binary (one coefficient row, sigmoid) or
//!   multinomial (softmax over one row per class)
//! - `random_forest`: trees whose leaves hold class counts; the forest
//!   probability is the mean of the normalized leaf distributions

use crate::errors::{HealthError, Result};
use serde::{Deserialize, Serialize};

/// Tolerance used when checking that probabilities sum to one
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// A fitted multi-class classifier over one scaled row
pub trait Classifier: Send + Sync {
    /// Number of input columns
    fn n_features(&self) -> usize;

    /// Number of output classes
    fn n_classes(&self) -> usize;

    /// Probability for each class position
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>>;

    /// Target-encoder index for an output position (identity by default)
    fn class_index(&self, position: usize) -> usize {
        position
    }

    /// Target-encoder index of the most probable class
    fn predict(&self, row: &[f64]) -> Result<usize> {
        let proba = self.predict_proba(row)?;
        let position = argmax(&proba).ok_or_else(|| {
            HealthError::PredictionFailure("classifier returned no probabilities".to_string())
        })?;
        Ok(self.class_index(position))
    }
}

/// Index of the largest value; the first one wins on ties
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Check that a probability vector is usable downstream
pub fn check_distribution(proba: &[f64], expected_classes: usize) -> Result<()> {
    if proba.len() != expected_classes {
        return Err(HealthError::PredictionFailure(format!(
            "expected {expected_classes} class probabilities, got {}",
            proba.len()
        )));
    }
    if proba.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(HealthError::PredictionFailure(
            "class probabilities must be finite and non-negative".to_string(),
        ));
    }
    let total: f64 = proba.iter().sum();
    if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(HealthError::PredictionFailure(format!(
            "class probabilities sum to {total}, expected 1"
        )));
    }
    Ok(())
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let ez = z.exp();
        ez / (1.0 + ez)
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Linear model with logistic link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// One row per class, or a single row for binary models
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl LogisticRegression {
    fn validate(&self) -> Result<()> {
        let width = self.coef.first().map(Vec::len).unwrap_or(0);
        if width == 0 {
            return Err(HealthError::SchemaMismatch(
                "logistic regression has no coefficients".to_string(),
            ));
        }
        if self.coef.iter().any(|row| row.len() != width) {
            return Err(HealthError::SchemaMismatch(
                "logistic regression coefficient rows differ in width".to_string(),
            ));
        }
        if self.intercept.len() != self.coef.len() {
            return Err(HealthError::SchemaMismatch(format!(
                "logistic regression has {} coefficient rows but {} intercepts",
                self.coef.len(),
                self.intercept.len()
            )));
        }
        let all_finite = self
            .coef
            .iter()
            .flatten()
            .chain(self.intercept.iter())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(HealthError::SchemaMismatch(
                "logistic regression has non-finite parameters".to_string(),
            ));
        }
        Ok(())
    }

    fn n_features(&self) -> usize {
        self.coef.first().map(Vec::len).unwrap_or(0)
    }

    fn n_classes(&self) -> usize {
        match self.coef.len() {
            1 => 2,
            n => n,
        }
    }

    fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let logits: Vec<f64> = self
            .coef
            .iter()
            .zip(self.intercept.iter())
            .map(|(w, b)| dot(w, row) + b)
            .collect();

        if logits.len() == 1 {
            let p = sigmoid(logits[0]);
            vec![1.0 - p, p]
        } else {
            softmax(&logits)
        }
    }
}

/// A node of a probability tree
///
/// Internal nodes have `feature_idx >= 0` and child indices; leaves have
/// `feature_idx == -1` and a per-class `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(rename = "feature_idx", alias = "feature")]
    pub feature_idx: i32,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default = "no_child")]
    pub left: i32,
    #[serde(default = "no_child")]
    pub right: i32,
    /// Class counts or weights at a leaf
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<f64>>,
}

fn no_child() -> i32 {
    -1
}

impl TreeNode {
    pub fn split(feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            feature_idx,
            threshold,
            left,
            right,
            value: None,
        }
    }

    pub fn leaf(value: Vec<f64>) -> Self {
        Self {
            feature_idx: -1,
            threshold: 0.0,
            left: -1,
            right: -1,
            value: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx < 0 || self.value.is_some()
    }
}

/// A single decision tree (node 0 is the root)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityTree {
    pub nodes: Vec<TreeNode>,
}

impl ProbabilityTree {
    /// Check that every node can be evaluated.
    ///
    /// Children must come after their parent, which rules out cycles.
    fn validate(&self, tree: usize, n_features: usize, n_classes: usize) -> Result<()> {
        let mismatch = |idx: usize, what: String| {
            Err(HealthError::SchemaMismatch(format!(
                "tree {tree} node {idx}: {what}"
            )))
        };

        for (idx, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                let Some(counts) = node.value.as_deref() else {
                    return mismatch(idx, "leaf has no class weights".to_string());
                };
                if counts.len() != n_classes {
                    return mismatch(
                        idx,
                        format!("leaf holds {} classes, expected {n_classes}", counts.len()),
                    );
                }
                if counts.iter().any(|c| !c.is_finite() || *c < 0.0)
                    || counts.iter().sum::<f64>() <= 0.0
                {
                    return mismatch(idx, "leaf class weights are unusable".to_string());
                }
                continue;
            }

            if node.feature_idx as usize >= n_features {
                return mismatch(
                    idx,
                    format!("splits on feature {} of {n_features}", node.feature_idx),
                );
            }
            if !node.threshold.is_finite() {
                return mismatch(idx, "threshold is not finite".to_string());
            }
            for child in [node.left, node.right] {
                if child <= idx as i32 || child as usize >= self.nodes.len() {
                    return mismatch(idx, format!("child {child} is out of range"));
                }
            }
        }
        Ok(())
    }

    /// Normalized class distribution at the leaf reached by `row`
    pub fn evaluate(&self, row: &[f64], n_classes: usize) -> Result<Vec<f64>> {
        let mut idx = 0usize;
        // a well-formed tree reaches a leaf in at most nodes.len() steps
        for _ in 0..=self.nodes.len() {
            let node = self.nodes.get(idx).ok_or_else(|| {
                HealthError::PredictionFailure(format!("tree node {idx} out of range"))
            })?;

            if node.is_leaf() {
                let counts = node.value.as_deref().unwrap_or_default();
                if counts.len() != n_classes {
                    return Err(HealthError::PredictionFailure(format!(
                        "leaf {idx} holds {} classes, expected {n_classes}",
                        counts.len()
                    )));
                }
                let total: f64 = counts.iter().sum();
                if !total.is_finite() || total <= 0.0 {
                    return Err(HealthError::PredictionFailure(format!(
                        "leaf {idx} has no class weight"
                    )));
                }
                return Ok(counts.iter().map(|c| c / total).collect());
            }

            let x = row.get(node.feature_idx as usize).ok_or_else(|| {
                HealthError::PredictionFailure(format!(
                    "node {idx} splits on missing feature {}",
                    node.feature_idx
                ))
            })?;
            let next = if *x <= node.threshold {
                node.left
            } else {
                node.right
            };
            if next < 0 {
                return Err(HealthError::PredictionFailure(format!(
                    "node {idx} has no child to follow"
                )));
            }
            idx = next as usize;
        }

        Err(HealthError::PredictionFailure(
            "tree traversal did not reach a leaf".to_string(),
        ))
    }
}

/// Averaging ensemble of probability trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    pub n_classes: usize,
    pub trees: Vec<ProbabilityTree>,
}

impl RandomForest {
    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() || self.trees.iter().any(|t| t.nodes.is_empty()) {
            return Err(HealthError::SchemaMismatch(
                "random forest must contain non-empty trees".to_string(),
            ));
        }
        if self.n_classes < 2 {
            return Err(HealthError::SchemaMismatch(
                "random forest must distinguish at least two classes".to_string(),
            ));
        }
        if self.n_features == 0 {
            return Err(HealthError::SchemaMismatch(
                "random forest has no input features".to_string(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i, self.n_features, self.n_classes)?;
        }
        Ok(())
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        let mut total = vec![0.0; self.n_classes];
        for tree in &self.trees {
            let dist = tree.evaluate(row, self.n_classes)?;
            for (acc, p) in total.iter_mut().zip(dist) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        Ok(total.into_iter().map(|p| p / n).collect())
    }
}

/// Model parameters by family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierModel {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
}

/// Serialized classifier artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    /// Column names the model was fit on, if recorded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_names: Vec<String>,
    /// Target-encoder index for each output position (identity when empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<usize>,
    #[serde(flatten)]
    pub model: ClassifierModel,
}

impl ClassifierArtifact {
    pub fn new(model: ClassifierModel) -> Self {
        Self {
            feature_names: Vec::new(),
            classes: Vec::new(),
            model,
        }
    }

    /// Check structural soundness of the parameters
    pub fn validate(&self) -> Result<()> {
        match &self.model {
            ClassifierModel::LogisticRegression(lr) => lr.validate()?,
            ClassifierModel::RandomForest(rf) => rf.validate()?,
        }
        if self.classes.is_empty() {
            return Ok(());
        }
        if self.classes.len() != self.n_classes() {
            return Err(HealthError::SchemaMismatch(format!(
                "classifier lists {} class labels for {} outputs",
                self.classes.len(),
                self.n_classes()
            )));
        }
        // each target index exactly once
        let mut sorted = self.classes.clone();
        sorted.sort_unstable();
        if sorted.iter().enumerate().any(|(i, &c)| i != c) {
            return Err(HealthError::SchemaMismatch(format!(
                "classifier classes {:?} are not a permutation of 0..{}",
                self.classes,
                self.n_classes()
            )));
        }
        Ok(())
    }

    /// Target-encoder index for an output position
    pub fn class_label(&self, position: usize) -> usize {
        self.classes.get(position).copied().unwrap_or(position)
    }
}

impl Classifier for ClassifierArtifact {
    fn n_features(&self) -> usize {
        match &self.model {
            ClassifierModel::LogisticRegression(lr) => lr.n_features(),
            ClassifierModel::RandomForest(rf) => rf.n_features,
        }
    }

    fn n_classes(&self) -> usize {
        match &self.model {
            ClassifierModel::LogisticRegression(lr) => lr.n_classes(),
            ClassifierModel::RandomForest(rf) => rf.n_classes,
        }
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.n_features() {
            return Err(HealthError::PredictionFailure(format!(
                "classifier expects {} features, got {}",
                self.n_features(),
                row.len()
            )));
        }
        match &self.model {
            ClassifierModel::LogisticRegression(lr) => Ok(lr.predict_proba(row)),
            ClassifierModel::RandomForest(rf) => rf.predict_proba(row),
        }
    }

    fn class_index(&self, position: usize) -> usize {
        self.class_label(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn stump() -> RandomForest {
        RandomForest {
            n_features: 1,
            n_classes: 2,
            trees: vec![
                ProbabilityTree {
                    nodes: vec![
                        TreeNode::split(0, 0.5, 1, 2),
                        TreeNode::leaf(vec![9.0, 1.0]),
                        TreeNode::leaf(vec![2.0, 8.0]),
                    ],
                },
                ProbabilityTree {
                    nodes: vec![TreeNode::leaf(vec![1.0, 1.0])],
                },
            ],
        }
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn binary_logistic_regression() {
        let model = ClassifierArtifact::new(ClassifierModel::LogisticRegression(
            LogisticRegression {
                coef: vec![vec![1.0, -1.0]],
                intercept: vec![0.0],
            },
        ));
        assert_eq!(model.n_classes(), 2);
        let proba = model.predict_proba(&[0.0, 0.0]).unwrap();
        assert!(approx(proba[0], 0.5) && approx(proba[1], 0.5));

        let proba = model.predict_proba(&[3.0, 0.0]).unwrap();
        assert!(proba[1] > 0.95);
        assert_eq!(model.predict(&[3.0, 0.0]).unwrap(), 1);
        check_distribution(&proba, 2).unwrap();
    }

    #[test]
    fn multinomial_logistic_regression_sums_to_one() {
        let model = ClassifierArtifact::new(ClassifierModel::LogisticRegression(
            LogisticRegression {
                coef: vec![vec![1.0], vec![0.0], vec![-1.0]],
                intercept: vec![0.0, 0.5, 0.0],
            },
        ));
        let proba = model.predict_proba(&[2.0]).unwrap();
        assert_eq!(proba.len(), 3);
        check_distribution(&proba, 3).unwrap();
        assert_eq!(model.predict(&[2.0]).unwrap(), 0);
        assert_eq!(model.predict(&[-2.0]).unwrap(), 2);
    }

    #[test]
    fn forest_averages_leaf_distributions() {
        let model = ClassifierArtifact::new(ClassifierModel::RandomForest(stump()));
        let proba = model.predict_proba(&[0.0]).unwrap();
        assert!(approx(proba[0], 0.7) && approx(proba[1], 0.3));

        let proba = model.predict_proba(&[1.0]).unwrap();
        assert!(approx(proba[0], 0.35) && approx(proba[1], 0.65));
        assert_eq!(model.predict(&[1.0]).unwrap(), 1);
    }

    #[test]
    fn class_mapping_translates_positions() {
        let mut model = ClassifierArtifact::new(ClassifierModel::RandomForest(stump()));
        model.classes = vec![1, 0];
        model.validate().unwrap();
        assert_eq!(model.predict(&[1.0]).unwrap(), 0);

        model.classes = vec![0];
        assert!(model.validate().is_err());
    }

    #[test]
    fn broken_tree_is_a_prediction_failure() {
        let mut forest = stump();
        forest.trees[0].nodes[0] = TreeNode::split(0, 0.5, 7, 2);
        let model = ClassifierArtifact::new(ClassifierModel::RandomForest(forest));
        assert!(matches!(
            model.predict_proba(&[0.0]),
            Err(HealthError::PredictionFailure(_))
        ));
    }

    #[test]
    fn forest_validation_walks_every_node() {
        let model = |forest: RandomForest| {
            ClassifierArtifact::new(ClassifierModel::RandomForest(forest)).validate()
        };
        assert!(model(stump()).is_ok());

        let mut unknown_feature = stump();
        unknown_feature.n_features = 2;
        unknown_feature.trees[0].nodes[0] = TreeNode::split(9, 0.5, 1, 2);
        assert!(matches!(
            model(unknown_feature),
            Err(HealthError::SchemaMismatch(_))
        ));

        let mut wide_leaf = stump();
        wide_leaf.trees[1].nodes[0] = TreeNode::leaf(vec![1.0, 1.0, 1.0]);
        assert!(matches!(model(wide_leaf), Err(HealthError::SchemaMismatch(_))));

        let mut dangling = stump();
        dangling.trees[0].nodes[0] = TreeNode::split(0, 0.5, 1, 7);
        assert!(matches!(model(dangling), Err(HealthError::SchemaMismatch(_))));

        let mut looping = stump();
        looping.trees[0].nodes[0] = TreeNode::split(0, 0.5, 0, 2);
        assert!(matches!(model(looping), Err(HealthError::SchemaMismatch(_))));

        let mut empty_leaf = stump();
        empty_leaf.trees[0].nodes[1] = TreeNode::leaf(vec![0.0, 0.0]);
        assert!(matches!(model(empty_leaf), Err(HealthError::SchemaMismatch(_))));
    }

    #[test]
    fn class_mapping_must_be_a_permutation() {
        let mut model = ClassifierArtifact::new(ClassifierModel::RandomForest(stump()));
        model.classes = vec![0, 0];
        assert!(matches!(model.validate(), Err(HealthError::SchemaMismatch(_))));

        model.classes = vec![0, 2];
        assert!(matches!(model.validate(), Err(HealthError::SchemaMismatch(_))));

        model.classes = vec![1, 0];
        assert!(model.validate().is_ok());
    }

    #[test]
    fn cyclic_tree_terminates() {
        let forest = RandomForest {
            n_features: 1,
            n_classes: 2,
            trees: vec![ProbabilityTree {
                nodes: vec![TreeNode::split(0, 0.5, 0, 0)],
            }],
        };
        let model = ClassifierArtifact::new(ClassifierModel::RandomForest(forest));
        assert!(matches!(
            model.predict_proba(&[0.0]),
            Err(HealthError::PredictionFailure(_))
        ));
    }

    #[test]
    fn wrong_width_is_rejected() {
        let model = ClassifierArtifact::new(ClassifierModel::RandomForest(stump()));
        assert!(matches!(
            model.predict_proba(&[0.0, 1.0]),
            Err(HealthError::PredictionFailure(_))
        ));
    }

    #[test]
    fn distribution_checks() {
        assert!(check_distribution(&[0.5, 0.5], 2).is_ok());
        assert!(check_distribution(&[0.5, 0.5], 3).is_err());
        assert!(check_distribution(&[0.7, 0.7], 2).is_err());
        assert!(check_distribution(&[1.2, -0.2], 2).is_err());
        assert!(check_distribution(&[f64::NAN, 1.0], 2).is_err());
    }

    #[test]
    fn parses_tagged_json() {
        let json = r#"{
            "kind": "random_forest",
            "n_features": 1,
            "n_classes": 2,
            "trees": [
                {"nodes": [
                    {"feature": 0, "threshold": 0.5, "left": 1, "right": 2},
                    {"feature_idx": -1, "value": [3, 1]},
                    {"feature_idx": -1, "value": [0, 4]}
                ]}
            ]
        }"#;
        let model: ClassifierArtifact = serde_json::from_str(json).unwrap();
        model.validate().unwrap();
        let proba = model.predict_proba(&[0.2]).unwrap();
        assert!(approx(proba[0], 0.75));

        let json = r#"{"kind": "logistic_regression", "coef": [[0.5, 0.5]], "intercept": [-1.0]}"#;
        let model: ClassifierArtifact = serde_json::from_str(json).unwrap();
        assert_eq!(model.n_features(), 2);
    }
}
