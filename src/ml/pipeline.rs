//! Two-stage regression pipeline: a vector assembler that packs the chosen
//! numeric columns into a feature matrix, followed by the boosted regressor.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

use super::artifacts::{publish_dir_atomic, write_json};
use super::gbt::{BoostingParameters, FeatureMatrix, GradientBoostedRegressor};
use super::{ModelMetadata, ModelType};
use crate::error::{ForecastError, Result};
use crate::forecast::columns::{PREDICTION, TARGET};

pub const METADATA_FILE: &str = "metadata.json";
pub const STAGES_FILE: &str = "stages.bin";

/// Packs named numeric columns into a row-major [`FeatureMatrix`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorAssembler {
    input_cols: Vec<String>,
}

impl VectorAssembler {
    pub fn new(input_cols: Vec<String>) -> Self {
        Self { input_cols }
    }

    pub fn input_cols(&self) -> &[String] {
        &self.input_cols
    }

    pub fn transform(&self, frame: &DataFrame) -> Result<FeatureMatrix> {
        let rows = frame.height();
        let cols = self.input_cols.len();
        let mut values = vec![0.0; rows * cols];

        for (j, name) in self.input_cols.iter().enumerate() {
            let column = frame.column(name)?.cast(&DataType::Float64)?;
            for (i, value) in column.f64()?.into_iter().enumerate() {
                values[i * cols + j] = value.ok_or_else(|| {
                    ForecastError::training(format!("null value in feature column '{name}'"))
                })?;
            }
        }

        FeatureMatrix::new(rows, cols, values)
    }
}

/// A fitted assembler + regressor pair, with its metadata.
#[derive(Debug)]
pub struct PipelineModel {
    pub metadata: ModelMetadata,
    assembler: VectorAssembler,
    regressor: GradientBoostedRegressor,
}

impl PipelineModel {
    /// Fit on `frame`, predicting the `target` column from `feature_cols`.
    pub fn fit(
        frame: &DataFrame,
        feature_cols: Vec<String>,
        params: BoostingParameters,
    ) -> Result<Self> {
        if feature_cols.is_empty() {
            return Err(ForecastError::training("no numeric features to train on"));
        }

        let assembler = VectorAssembler::new(feature_cols);
        let x = assembler.transform(frame)?;
        let y: Vec<f64> = frame
            .column(TARGET)?
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.ok_or_else(|| ForecastError::training("null target value")))
            .collect::<Result<_>>()?;

        let regressor = GradientBoostedRegressor::fit(&x, &y, params)?;
        let metadata = ModelMetadata::new(
            ModelType::GradientBoostedTrees,
            assembler.input_cols().to_vec(),
            &regressor.params,
            frame.height(),
        );

        Ok(Self {
            metadata,
            assembler,
            regressor,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        self.assembler.input_cols()
    }

    pub fn n_trees(&self) -> usize {
        self.regressor.n_trees()
    }

    pub fn predict(&self, frame: &DataFrame) -> Result<Vec<f64>> {
        let x = self.assembler.transform(frame)?;
        self.regressor.predict(&x)
    }

    /// `frame` with a `prediction` column appended.
    pub fn transform(&self, frame: &DataFrame) -> Result<DataFrame> {
        let predictions = self.predict(frame)?;
        let mut scored = frame.clone();
        scored.with_column(Series::new(PREDICTION, predictions))?;
        Ok(scored)
    }

    /// Persist to `dir`, replacing whatever was there.
    pub fn save(&self, dir: &Path) -> Result<()> {
        publish_dir_atomic(dir, |staging| {
            write_json(&staging.join(METADATA_FILE), &self.metadata)?;

            let path = staging.join(STAGES_FILE);
            let file = File::create(&path).map_err(|e| ForecastError::io(&path, e))?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(&mut writer, &(&self.assembler, &self.regressor))
                .map_err(|e| ForecastError::Serialization(e.to_string()))?;
            writer.flush().map_err(|e| ForecastError::io(&path, e))
        })?;
        info!(path = %dir.display(), model_id = %self.metadata.model_id, "saved pipeline model");
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let meta_path = dir.join(METADATA_FILE);
        let raw = fs::read_to_string(&meta_path).map_err(|e| ForecastError::io(&meta_path, e))?;
        let metadata: ModelMetadata = serde_json::from_str(&raw)
            .map_err(|e| ForecastError::Serialization(e.to_string()))?;

        let stages_path = dir.join(STAGES_FILE);
        let file = File::open(&stages_path).map_err(|e| ForecastError::io(&stages_path, e))?;
        let (assembler, regressor): (VectorAssembler, GradientBoostedRegressor) =
            bincode::deserialize_from(BufReader::new(file))
                .map_err(|e| ForecastError::Serialization(e.to_string()))?;

        Ok(Self {
            metadata,
            assembler,
            regressor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        let hours: Vec<i32> = (0..30).map(|i| i % 24).collect();
        let lag: Vec<f64> = (0..30).map(|i| (i * 3 % 17) as f64).collect();
        let target: Vec<f64> = hours
            .iter()
            .zip(&lag)
            .map(|(h, l)| *h as f64 * 2.0 + l)
            .collect();
        df!("hour" => hours, "lag1_power" => lag, "target" => target).unwrap()
    }

    #[test]
    fn test_assembler_orders_columns() {
        let df = df!("a" => &[1.0, 2.0], "b" => &[10i32, 20]).unwrap();
        let x = VectorAssembler::new(vec!["b".into(), "a".into()])
            .transform(&df)
            .unwrap();
        assert_eq!(x.rows(), 2);
        assert_eq!(x.row(0), Some(&[10.0, 1.0][..]));
        assert_eq!(x.row(1), Some(&[20.0, 2.0][..]));
    }

    #[test]
    fn test_assembler_rejects_nulls() {
        let df = df!("a" => &[Some(1.0), None]).unwrap();
        let err = VectorAssembler::new(vec!["a".into()])
            .transform(&df)
            .unwrap_err();
        assert!(err.is_training());
    }

    #[test]
    fn test_transform_appends_prediction() {
        let df = frame();
        let model = PipelineModel::fit(
            &df,
            vec!["hour".into(), "lag1_power".into()],
            BoostingParameters::default(),
        )
        .unwrap();
        let scored = model.transform(&df).unwrap();
        assert_eq!(scored.width(), df.width() + 1);
        assert_eq!(scored.column(PREDICTION).unwrap().len(), 30);
        assert_eq!(model.metadata.training_samples, 30);
        assert_eq!(model.metadata.feature_names, vec!["hour", "lag1_power"]);
    }

    #[test]
    fn test_requires_features() {
        let err = PipelineModel::fit(&frame(), vec![], BoostingParameters::default()).unwrap_err();
        assert!(err.is_training());
    }

    #[test]
    fn test_save_and_load() {
        let df = frame();
        let model = PipelineModel::fit(
            &df,
            vec!["hour".into(), "lag1_power".into()],
            BoostingParameters::default(),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("gbt_model");
        model.save(&model_dir).unwrap();
        // Saving again replaces the directory in place.
        model.save(&model_dir).unwrap();

        assert!(model_dir.join(METADATA_FILE).exists());
        assert!(model_dir.join(STAGES_FILE).exists());

        let restored = PipelineModel::load(&model_dir).unwrap();
        assert_eq!(restored.metadata.model_id, model.metadata.model_id);
        assert_eq!(restored.feature_names(), model.feature_names());
        assert_eq!(restored.predict(&df).unwrap(), model.predict(&df).unwrap());
    }
}
