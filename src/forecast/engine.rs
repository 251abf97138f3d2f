use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{assemble, io, normalize_power, normalize_weather, FeatureBuilder};
use crate::config::Config;
use crate::error::ForecastError;
use crate::ml::artifacts::{self, ArtifactPaths, OutputLayout};
use crate::ml::{EvaluationMetrics, ModelTrainer};
use crate::session::ForecastSession;

/// What a completed run reports, and what lands in `metrics.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub model_id: String,
    pub metrics: EvaluationMetrics,
    pub artifacts: ArtifactPaths,
    pub feature_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub features: Vec<String>,
}

/// Runs one forecasting job end to end.
///
/// Every run opens its own [`ForecastSession`]; nothing is shared between runs.
pub struct ForecastEngine {
    config: Config,
}

impl ForecastEngine {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the configured CSV inputs and run the pipeline on them.
    pub fn run(&self) -> Result<RunSummary> {
        self.config.validate()?;
        let pipeline = &self.config.pipeline;
        let power_path = pipeline
            .power_csv
            .as_deref()
            .ok_or_else(|| ForecastError::Config("no power table configured".into()))?;

        let session = ForecastSession::open(&self.config.engine)?;
        session.install(|| {
            let power = io::read_csv(power_path, pipeline.infer_schema_rows)
                .context("loading power table")?;
            let weather = pipeline
                .weather_csv
                .as_deref()
                .map(|path| io::read_csv(path, pipeline.infer_schema_rows))
                .transpose()
                .context("loading weather table")?;
            self.execute(&power, weather.as_ref())
        })
    }

    /// Run the pipeline on tables already in memory.
    pub fn run_frames(&self, power: &DataFrame, weather: Option<&DataFrame>) -> Result<RunSummary> {
        self.config.validate()?;
        let session = ForecastSession::open(&self.config.engine)?;
        session.install(|| self.execute(power, weather))
    }

    fn execute(&self, power: &DataFrame, weather: Option<&DataFrame>) -> Result<RunSummary> {
        let normalized = normalize_power(power).context("schema normalization")?;
        let weather = weather
            .map(normalize_weather)
            .transpose()
            .context("weather normalization")?;

        let built = FeatureBuilder::new()
            .build(&normalized, weather.as_ref())
            .context("feature building")?;
        let table = assemble(&built).context("dataset assembly")?;
        info!(rows = table.height(), features = ?table.numeric_features(), "feature table ready");

        let layout = OutputLayout::new(&self.config.pipeline.output_dir, &self.config.pipeline.model_name);
        let report = ModelTrainer::new(self.config.training.clone())
            .train_and_evaluate(&table, &layout)
            .context("training")?;

        let summary = RunSummary {
            model_id: report.model_id,
            metrics: report.metrics,
            artifacts: report.artifacts,
            feature_rows: table.height(),
            train_rows: report.train_rows,
            test_rows: report.test_rows,
            features: report.features,
        };
        artifacts::write_json(&layout.metrics(), &summary).context("writing run summary")?;

        info!(
            rmse = summary.metrics.rmse,
            mae = summary.metrics.mae,
            output = %layout.root().display(),
            "forecast run complete"
        );
        Ok(summary)
    }
}
