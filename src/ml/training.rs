//! ML Model Training Pipeline
//!
//! Splits an assembled feature table, fits the boosted pipeline on the train
//! partition, scores the test partition and persists the results.

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::artifacts::{self, ArtifactPaths, OutputLayout};
use super::gbt::BoostingParameters;
use super::metrics::EvaluationMetrics;
use super::pipeline::PipelineModel;
use crate::error::{ForecastError, Result};
use crate::forecast::columns::{PREDICTION, TARGET, TIMESTAMP};
use crate::forecast::FeatureTable;

/// Training Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of rows drawn into the train partition
    pub train_ratio: f64,
    pub seed: u64,
    /// Boosting iterations
    pub max_iter: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    /// Row cap for the CSV prediction sample
    pub sample_rows: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            seed: 42,
            max_iter: 50,
            learning_rate: 0.1,
            max_depth: 5,
            min_samples_leaf: 1,
            min_samples_split: 2,
            sample_rows: 500,
        }
    }
}

impl TrainingConfig {
    pub fn boosting(&self) -> BoostingParameters {
        BoostingParameters {
            n_iterations: self.max_iter,
            learning_rate: self.learning_rate,
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            min_samples_split: self.min_samples_split,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(ForecastError::Config(format!(
                "train_ratio must be between 0 and 1, got {}",
                self.train_ratio
            )));
        }
        if self.max_iter == 0 {
            return Err(ForecastError::Config("max_iter must be at least 1".into()));
        }
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(ForecastError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.max_depth == 0 {
            return Err(ForecastError::Config("max_depth must be at least 1".into()));
        }
        if !(1..=500).contains(&self.sample_rows) {
            return Err(ForecastError::Config(format!(
                "sample_rows must be within 1..=500, got {}",
                self.sample_rows
            )));
        }
        Ok(())
    }
}

/// Seeded per-row split into (train, test).
pub fn random_split(frame: &DataFrame, train_ratio: f64, seed: u64) -> Result<(DataFrame, DataFrame)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let draws: Vec<bool> = (0..frame.height())
        .map(|_| rng.gen::<f64>() < train_ratio)
        .collect();
    let train_mask = BooleanChunked::from_slice("train", &draws);
    let test_mask = !&train_mask;
    Ok((frame.filter(&train_mask)?, frame.filter(&test_mask)?))
}

/// A fitted model and its held-out evaluation, before anything is written.
#[derive(Debug)]
pub struct Evaluation {
    pub model: PipelineModel,
    /// Test partition with `prediction` appended
    pub scored: DataFrame,
    pub metrics: EvaluationMetrics,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Outcome of a persisted training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_id: String,
    pub metrics: EvaluationMetrics,
    pub artifacts: ArtifactPaths,
    pub train_rows: usize,
    pub test_rows: usize,
    pub features: Vec<String>,
}

/// Model Trainer
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Split, fit and score without touching the filesystem.
    pub fn fit_and_evaluate(&self, table: &FeatureTable) -> Result<Evaluation> {
        let features = table.numeric_features();
        if features.is_empty() {
            return Err(ForecastError::training("no numeric features"));
        }

        let (train, test) = random_split(table.frame(), self.config.train_ratio, self.config.seed)?;
        info!(
            train_rows = train.height(),
            test_rows = test.height(),
            seed = self.config.seed,
            "split feature table"
        );
        if train.height() == 0 || test.height() == 0 {
            return Err(ForecastError::training(format!(
                "degenerate split: {} train rows, {} test rows",
                train.height(),
                test.height()
            )));
        }

        let mut model = PipelineModel::fit(&train, features, self.config.boosting())?;
        let scored = model
            .transform(&test)?
            .select([TIMESTAMP, TARGET, PREDICTION])?;

        let actual = f64_values(&scored, TARGET)?;
        let predicted = f64_values(&scored, PREDICTION)?;
        let metrics = EvaluationMetrics::calculate(&actual, &predicted)?;
        info!(%metrics, trees = model.n_trees(), "evaluated on held-out split");

        model.metadata.test_samples = test.height();
        model.metadata.validation_metrics = Some(metrics.clone());

        Ok(Evaluation {
            model,
            scored,
            metrics,
            train_rows: train.height(),
            test_rows: test.height(),
        })
    }

    /// Fit, evaluate and persist predictions, the sample and the model.
    pub fn train_and_evaluate(&self, table: &FeatureTable, layout: &OutputLayout) -> Result<TrainingReport> {
        let evaluation = self.fit_and_evaluate(table)?;

        layout.ensure_root()?;
        artifacts::write_predictions_parquet(&layout.predictions(), &evaluation.scored)?;
        if evaluation.scored.height() > self.config.sample_rows {
            warn!(
                rows = evaluation.scored.height(),
                limit = self.config.sample_rows,
                "truncating prediction sample"
            );
        }
        artifacts::write_sample_csv(&layout.sample(), &evaluation.scored, self.config.sample_rows)?;
        evaluation.model.save(&layout.model_dir())?;

        Ok(TrainingReport {
            model_id: evaluation.model.metadata.model_id.clone(),
            features: evaluation.model.feature_names().to_vec(),
            metrics: evaluation.metrics,
            artifacts: layout.paths(),
            train_rows: evaluation.train_rows,
            test_rows: evaluation.test_rows,
        })
    }
}

fn f64_values(frame: &DataFrame, name: &str) -> Result<Vec<f64>> {
    frame
        .column(name)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.ok_or_else(|| ForecastError::training(format!("null value in '{name}'"))))
        .collect()
}
