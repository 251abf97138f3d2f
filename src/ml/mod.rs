//! Machine Learning Module
//!
//! Trains and evaluates the consumption regressor on an assembled feature
//! table:
//! - Seeded train/test split
//! - Gradient-boosted regression trees behind a vector-assembler pipeline
//! - Held-out RMSE/MAE evaluation
//! - Model and prediction artifacts

use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

pub mod artifacts;
pub mod gbt;
pub mod metrics;
pub mod pipeline;
pub mod training;

pub use artifacts::{ArtifactPaths, OutputLayout};
pub use gbt::{BoostingParameters, FeatureMatrix, GradientBoostedRegressor};
pub use metrics::{EvaluationMetrics, MetricsError};
pub use pipeline::{PipelineModel, VectorAssembler};
pub use training::{ModelTrainer, TrainingConfig, TrainingReport};

/// ML Model Type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    GradientBoostedTrees,
}

/// ML Model Metadata, stored next to the fitted stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub model_type: ModelType,
    pub version: String,
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub training_samples: usize,
    pub test_samples: usize,
    pub feature_names: Vec<String>,
    pub parameters: BoostingParameters,
    pub validation_metrics: Option<EvaluationMetrics>,
}

impl ModelMetadata {
    pub fn new(
        model_type: ModelType,
        feature_names: Vec<String>,
        parameters: &BoostingParameters,
        training_samples: usize,
    ) -> Self {
        Self {
            model_id: Uuid::new_v4().to_string(),
            model_type,
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: chrono::Utc::now(),
            training_samples,
            test_samples: 0,
            feature_names,
            parameters: parameters.clone(),
            validation_metrics: None,
        }
    }
}
