//! Weather table normalization
//!
//! Weather files come with loosely named columns (`Temp_C`, `rel_humidity`,
//! `CloudCover`, ...). This module renames them through [`WeatherField`] and
//! reduces the table to one row per timestamp so the join stays one-to-one.

use polars::prelude::*;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::columns::{find_column, WeatherField, TIMESTAMP};
use super::schema::{datetime_series, epoch_millis};
use crate::error::{ForecastError, Result};

/// Which source column feeds which canonical weather field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherMapping {
    pub fields: Vec<(String, WeatherField)>,
    pub ignored: Vec<String>,
}

impl WeatherMapping {
    /// Classify every non-timestamp column. When two columns map to the same
    /// field the first one in table order keeps it.
    pub fn from_columns(columns: &[&str]) -> Self {
        let mut fields = Vec::new();
        let mut ignored = Vec::new();
        let mut claimed = HashSet::new();

        for col in columns.iter().filter(|c| !c.eq_ignore_ascii_case(TIMESTAMP)) {
            match WeatherField::classify(col) {
                Some(field) if claimed.insert(field) => fields.push((col.to_string(), field)),
                Some(field) => {
                    warn!(
                        column = %col,
                        field = field.as_ref(),
                        "weather column maps to an already claimed field, ignoring"
                    );
                    ignored.push(col.to_string());
                }
                None => ignored.push(col.to_string()),
            }
        }

        Self { fields, ignored }
    }
}

/// Normalize a weather table to `timestamp` plus whichever of `temperature`,
/// `humidity` and `cloud_cover` it provides, all as `Float64`.
///
/// Rows without a usable timestamp are dropped; for repeated timestamps the
/// first row wins.
pub fn normalize_weather(raw: &DataFrame) -> Result<DataFrame> {
    let names = raw.get_column_names();
    let ts_col = find_column(&names, TIMESTAMP)
        .ok_or_else(|| ForecastError::schema("weather table has no timestamp column"))?;
    let millis = epoch_millis(raw.column(ts_col)?)?;

    let mapping = WeatherMapping::from_columns(&names);
    debug!(mapped = ?mapping.fields, ignored = ?mapping.ignored, "weather column mapping");

    let mut columns = vec![datetime_series(TIMESTAMP, &millis)];
    for (source, field) in &mapping.fields {
        let mut values = raw.column(source)?.cast(&DataType::Float64)?;
        values.rename(field.feature().name());
        columns.push(values);
    }

    let table = DataFrame::new(columns)?
        .lazy()
        .filter(col(TIMESTAMP).is_not_null())
        .unique_stable(Some(vec![TIMESTAMP.to_string()]), UniqueKeepStrategy::First)
        .collect()?;

    let dropped = raw.height() - table.height();
    if dropped > 0 {
        warn!(
            dropped,
            rows = raw.height(),
            "dropping weather rows with missing or repeated timestamps"
        );
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_first_column_claims_field() {
        let mapping = WeatherMapping::from_columns(&["timestamp", "temp_max", "temp_min", "Humidity"]);
        assert_eq!(
            mapping.fields,
            vec![
                ("temp_max".to_string(), WeatherField::Temperature),
                ("Humidity".to_string(), WeatherField::Humidity),
            ]
        );
        assert_eq!(mapping.ignored, vec!["temp_min".to_string()]);
    }

    #[test]
    fn test_normalize_weather_renames_and_casts() {
        let raw = df!(
            "timestamp" => &["2024-01-01 00:00:00", "2024-01-01 01:00:00"],
            "Temp_C" => &[1i64, 2],
            "cloud_cover_pct" => &[50.0, 75.0],
            "wind" => &[3.0, 4.0]
        )
        .unwrap();

        let out = normalize_weather(&raw).unwrap();
        assert_eq!(out.get_column_names(), vec!["timestamp", "temperature", "cloud_cover"]);
        assert_eq!(out.column("temperature").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_repeated_timestamps_keep_first() {
        let raw = df!(
            "timestamp" => &["2024-01-01", "2024-01-01", "bad", "2024-01-02"],
            "temperature" => &[1.0, 2.0, 3.0, 4.0]
        )
        .unwrap();

        let out = normalize_weather(&raw).unwrap();
        let temps: Vec<f64> = out
            .column("temperature")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(temps, vec![1.0, 4.0]);
    }

    #[test]
    fn test_missing_timestamp_is_schema_error() {
        let raw = df!("temp" => &[1.0]).unwrap();
        assert!(normalize_weather(&raw).unwrap_err().is_schema());
    }
}
