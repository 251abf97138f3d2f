//! Gradient-Boosted Regression Trees
//!
//! Boosting on top of SmartCore's `DecisionTreeRegressor`: start from the mean
//! target, then repeatedly fit a shallow tree to the residuals and add a
//! damped copy of its output to the running prediction.

use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use tracing::debug;

use crate::error::{ForecastError, Result};

type Tree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Row-major feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl FeatureMatrix {
    pub fn new(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        if rows * cols != values.len() {
            return Err(ForecastError::training(format!(
                "feature matrix shape {rows}x{cols} does not match {} values",
                values.len()
            )));
        }
        Ok(Self { rows, cols, values })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row `i`, or `None` past the last row.
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        if i >= self.rows {
            return None;
        }
        self.values.get(i * self.cols..(i + 1) * self.cols)
    }

    fn to_dense(&self) -> DenseMatrix<f64> {
        DenseMatrix::new(self.rows, self.cols, self.values.clone(), false)
    }
}

/// Boosting parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParameters {
    /// Number of boosting iterations (trees)
    pub n_iterations: usize,
    /// Shrinkage applied to every tree's contribution
    pub learning_rate: f64,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
}

impl Default for BoostingParameters {
    fn default() -> Self {
        Self {
            n_iterations: 50,
            learning_rate: 0.1,
            max_depth: 5,
            min_samples_leaf: 1,
            min_samples_split: 2,
        }
    }
}

impl BoostingParameters {
    fn tree_parameters(&self) -> DecisionTreeRegressorParameters {
        DecisionTreeRegressorParameters::default()
            .with_max_depth(self.max_depth)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_min_samples_split(self.min_samples_split)
    }
}

/// Fitted boosted ensemble
#[derive(Debug, Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    pub params: BoostingParameters,
    init: f64,
    n_features: usize,
    trees: Vec<Tree>,
}

impl GradientBoostedRegressor {
    pub fn fit(x: &FeatureMatrix, y: &[f64], params: BoostingParameters) -> Result<Self> {
        if x.rows() == 0 {
            return Err(ForecastError::training("cannot train on empty dataset"));
        }
        if x.rows() != y.len() {
            return Err(ForecastError::training(format!(
                "feature and target count mismatch: {} rows, {} targets",
                x.rows(),
                y.len()
            )));
        }
        if params.n_iterations == 0 {
            return Err(ForecastError::training("at least one boosting iteration is required"));
        }

        let dense = x.to_dense();
        let init = y.iter().sum::<f64>() / y.len() as f64;
        let mut current = vec![init; y.len()];
        let mut trees = Vec::with_capacity(params.n_iterations);

        for iteration in 0..params.n_iterations {
            let residuals: Vec<f64> = y.iter().zip(&current).map(|(t, p)| t - p).collect();
            if residuals.iter().all(|r| r.abs() < 1e-12) {
                debug!(iteration, "residuals vanished, stopping early");
                break;
            }

            let tree = Tree::fit(&dense, &residuals, params.tree_parameters()).map_err(|e| {
                ForecastError::training(format!("tree {iteration} failed to fit: {e}"))
            })?;
            let update = tree.predict(&dense).map_err(|e| {
                ForecastError::training(format!("tree {iteration} failed to predict: {e}"))
            })?;
            for (c, u) in current.iter_mut().zip(&update) {
                *c += params.learning_rate * u;
            }
            trees.push(tree);
        }

        debug!(
            trees = trees.len(),
            rows = x.rows(),
            features = x.cols(),
            "fitted gradient-boosted ensemble"
        );
        Ok(Self {
            params,
            init,
            n_features: x.cols(),
            trees,
        })
    }

    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        if x.cols() != self.n_features {
            return Err(ForecastError::training(format!(
                "feature count mismatch: expected {}, got {}",
                self.n_features,
                x.cols()
            )));
        }
        let mut out = vec![self.init; x.rows()];
        if x.rows() == 0 {
            return Ok(out);
        }

        let dense = x.to_dense();
        for tree in &self.trees {
            let update = tree
                .predict(&dense)
                .map_err(|e| ForecastError::training(format!("prediction failed: {e}")))?;
            for (o, u) in out.iter_mut().zip(&update) {
                *o += self.params.learning_rate * u;
            }
        }
        Ok(out)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}
