//! Dataset assembly
//!
//! Turns the feature builder's output into the training table: `timestamp`,
//! `target` and the canonical feature columns that are present, with the
//! target never null and every feature null replaced by zero.

use polars::prelude::*;
use tracing::{debug, warn};

use super::columns::{FeatureColumn, POWER, TARGET, TIMESTAMP};
use crate::error::{ForecastError, Result};

/// A fully assembled, imputed feature table ready for training.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    frame: DataFrame,
}

impl FeatureTable {
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Every numeric column except the target and timestamp, in table order.
    pub fn numeric_features(&self) -> Vec<String> {
        numeric_features(&self.frame)
    }
}

/// Numeric columns of `frame` other than `target` and `timestamp`.
pub fn numeric_features(frame: &DataFrame) -> Vec<String> {
    frame
        .get_columns()
        .iter()
        .filter(|s| s.name() != TARGET && s.name() != TIMESTAMP && s.dtype().is_numeric())
        .map(|s| s.name().to_string())
        .collect()
}

fn fill_zero(series: &Series) -> Result<Series> {
    if series.null_count() == 0 {
        return Ok(series.clone());
    }
    let filled = match series.dtype() {
        DataType::Int32 => series.i32()?.fill_null_with_values(0)?.into_series(),
        DataType::Int64 => series.i64()?.fill_null_with_values(0)?.into_series(),
        _ => series
            .cast(&DataType::Float64)?
            .f64()?
            .fill_null_with_values(0.0)?
            .into_series(),
    };
    Ok(filled)
}

/// Assemble the training table from a feature-builder output.
pub fn assemble(features: &DataFrame) -> Result<FeatureTable> {
    let names = features.get_column_names();
    if !names.contains(&TIMESTAMP) || !names.contains(&POWER) {
        return Err(ForecastError::schema(
            "feature table needs timestamp and power columns",
        ));
    }

    let available: Vec<&str> = FeatureColumn::all()
        .map(FeatureColumn::name)
        .filter(|c| names.contains(c))
        .collect();

    let mut selection = vec![TIMESTAMP, POWER];
    selection.extend(available.iter().copied());
    let mut frame = features.select(selection)?;
    frame.rename(POWER, TARGET)?;

    let rows_in = frame.height();
    let mask = frame.column(TARGET)?.is_not_null();
    let mut frame = frame.filter(&mask)?;
    let dropped = rows_in - frame.height();
    if dropped > 0 {
        warn!(dropped, "dropping rows without a target value");
    }

    for name in &available {
        let filled = fill_zero(frame.column(name)?)?;
        frame.with_column(filled)?;
    }

    debug!(rows = frame.height(), features = ?available, "assembled feature table");
    Ok(FeatureTable { frame })
}
