//! Run artifacts
//!
//! Everything a run leaves on disk lives under one output root:
//!
//! ```text
//! <root>/predictions.parquet
//! <root>/predictions_sample.csv
//! <root>/metrics.json
//! <root>/<model_name>/metadata.json
//! <root>/<model_name>/stages.bin
//! ```
//!
//! Files and the model directory are staged next to their destination and
//! renamed into place, so a failed run never leaves a half-written artifact
//! behind and a rerun overwrites the previous one.

use chrono::DateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ForecastError, Result};
use crate::forecast::columns::{PREDICTION, TARGET, TIMESTAMP};

pub const PREDICTIONS_FILE: &str = "predictions.parquet";
pub const SAMPLE_FILE: &str = "predictions_sample.csv";
pub const METRICS_FILE: &str = "metrics.json";

/// Where a run writes its outputs.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    model_name: String,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, model_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            model_name: model_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn predictions(&self) -> PathBuf {
        self.root.join(PREDICTIONS_FILE)
    }

    pub fn sample(&self) -> PathBuf {
        self.root.join(SAMPLE_FILE)
    }

    pub fn model_dir(&self) -> PathBuf {
        self.root.join(&self.model_name)
    }

    pub fn metrics(&self) -> PathBuf {
        self.root.join(METRICS_FILE)
    }

    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| ForecastError::io(&self.root, e))
    }

    pub fn paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            predictions: self.predictions(),
            sample: self.sample(),
            model: self.model_dir(),
            metrics: self.metrics(),
        }
    }
}

/// Locations of the artifacts a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub predictions: PathBuf,
    pub sample: PathBuf,
    pub model: PathBuf,
    pub metrics: PathBuf,
}

fn staging_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
}

/// Write `dest` by staging the bytes in a sibling file and renaming it over.
pub fn write_file_atomic<F>(dest: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let tmp = staging_path(dest);
    let outcome = File::create(&tmp)
        .map_err(|e| ForecastError::io(&tmp, e))
        .and_then(|mut file| {
            write(&mut file)?;
            file.sync_all().map_err(|e| ForecastError::io(&tmp, e))
        })
        .and_then(|_| fs::rename(&tmp, dest).map_err(|e| ForecastError::io(dest, e)));

    if outcome.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    outcome
}

/// Populate a staging directory, then swap it in for `dest`.
pub fn publish_dir_atomic<F>(dest: &Path, populate: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let tmp = staging_path(dest);
    fs::create_dir_all(&tmp).map_err(|e| ForecastError::io(&tmp, e))?;

    if let Err(e) = populate(&tmp) {
        let _ = fs::remove_dir_all(&tmp);
        return Err(e);
    }

    // At every step either `dest` or the aside copy holds a complete model.
    let previous = if dest.exists() {
        let aside = staging_path(dest);
        fs::rename(dest, &aside).map_err(|e| {
            let _ = fs::remove_dir_all(&tmp);
            ForecastError::io(dest, e)
        })?;
        Some(aside)
    } else {
        None
    };

    if let Err(e) = fs::rename(&tmp, dest) {
        if let Some(aside) = &previous {
            let _ = fs::rename(aside, dest);
        }
        let _ = fs::remove_dir_all(&tmp);
        return Err(ForecastError::io(dest, e));
    }

    if let Some(aside) = previous {
        fs::remove_dir_all(&aside).map_err(|e| ForecastError::io(&aside, e))?;
    }
    Ok(())
}

pub fn write_json<T: Serialize>(dest: &Path, value: &T) -> Result<()> {
    write_file_atomic(dest, |file| {
        serde_json::to_writer_pretty(&mut *file, value)
            .map_err(|e| ForecastError::Serialization(e.to_string()))?;
        file.write_all(b"\n").map_err(|e| ForecastError::io(dest, e))
    })
}

/// Columnar copy of the scored test partition.
pub fn write_predictions_parquet(dest: &Path, scored: &DataFrame) -> Result<()> {
    let mut frame = scored.clone();
    write_file_atomic(dest, |file| {
        ParquetWriter::new(file).finish(&mut frame)?;
        Ok(())
    })?;
    info!(path = %dest.display(), rows = scored.height(), "wrote predictions");
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictionRecord {
    pub timestamp: String,
    pub target: f64,
    pub prediction: f64,
}

fn prediction_records(scored: &DataFrame, limit: usize) -> Result<Vec<PredictionRecord>> {
    let rows = scored.height().min(limit);
    let head = scored.head(Some(rows));

    let timestamps = head.column(TIMESTAMP)?.cast(&DataType::Int64)?;
    let targets = head.column(TARGET)?.cast(&DataType::Float64)?;
    let predictions = head.column(PREDICTION)?.cast(&DataType::Float64)?;

    let records = timestamps
        .i64()?
        .into_iter()
        .zip(targets.f64()?)
        .zip(predictions.f64()?)
        .map(|((ts, target), prediction)| PredictionRecord {
            timestamp: ts
                .and_then(DateTime::from_timestamp_millis)
                .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            target: target.unwrap_or(f64::NAN),
            prediction: prediction.unwrap_or(f64::NAN),
        })
        .collect();
    Ok(records)
}

/// Human-readable head of the scored test partition, at most `limit` rows.
pub fn write_sample_csv(dest: &Path, scored: &DataFrame, limit: usize) -> Result<()> {
    let records = prediction_records(scored, limit)?;
    write_file_atomic(dest, |file| {
        let mut writer = csv::Writer::from_writer(file);
        for record in &records {
            writer
                .serialize(record)
                .map_err(|e| ForecastError::Serialization(e.to_string()))?;
        }
        writer.flush().map_err(|e| ForecastError::io(dest, e))
    })?;
    debug!(path = %dest.display(), rows = records.len(), "wrote prediction sample");
    Ok(())
}
