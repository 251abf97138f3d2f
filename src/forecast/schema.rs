//! Schema normalization
//!
//! Maps a raw power table onto the canonical `(timestamp, power)` pair. The
//! time basis is either an explicit `timestamp` column or a `Year`/`Month`
//! pair; the power column is resolved through [`POWER_COLUMN`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, warn};

use super::columns::{find_column, MONTH, POWER, POWER_COLUMN, TIMESTAMP, YEAR};
use crate::error::{ForecastError, Result};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const MONTH_NAMES: &[(&str, u32)] = &[
    ("jan", 1),
    ("january", 1),
    ("feb", 2),
    ("february", 2),
    ("mar", 3),
    ("march", 3),
    ("apr", 4),
    ("april", 4),
    ("may", 5),
    ("jun", 6),
    ("june", 6),
    ("jul", 7),
    ("july", 7),
    ("aug", 8),
    ("august", 8),
    ("sep", 9),
    ("sept", 9),
    ("september", 9),
    ("oct", 10),
    ("october", 10),
    ("nov", 11),
    ("november", 11),
    ("dec", 12),
    ("december", 12),
];

/// Where a table's timestamps came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBasis {
    Timestamp,
    YearMonth,
}

/// Parse a textual timestamp. Offsets are converted to UTC; bare dates map to
/// midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Resolve a month name, abbreviation or number to 1..=12.
pub fn resolve_month(raw: &str) -> Option<u32> {
    let key = raw.trim().to_lowercase();
    if let Some((_, month)) = MONTH_NAMES.iter().find(|(name, _)| *name == key) {
        return Some(*month);
    }
    key.parse::<u32>()
        .ok()
        .or_else(|| {
            key.parse::<f64>()
                .ok()
                .filter(|v| v.fract() == 0.0 && *v >= 0.0)
                .map(|v| v as u32)
        })
        .filter(|m| (1..=12).contains(m))
}

/// `ms` if it names a representable date-time.
fn representable(ms: i64) -> Option<i64> {
    DateTime::from_timestamp_millis(ms).map(|_| ms)
}

/// Read any timestamp-like series as epoch milliseconds.
///
/// Datetime/Date columns are converted directly, integer columns are taken as
/// Unix seconds, anything else is parsed as text. Unparseable or
/// out-of-range values are null.
pub fn epoch_millis(series: &Series) -> Result<Vec<Option<i64>>> {
    match series.dtype() {
        DataType::Datetime(_, _) | DataType::Date => {
            let ms = series
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
                .cast(&DataType::Int64)?;
            Ok(ms.i64()?.into_iter().map(|v| v.and_then(representable)).collect())
        }
        dt if dt.is_integer() => {
            let secs = series.cast(&DataType::Int64)?;
            Ok(secs
                .i64()?
                .into_iter()
                .map(|v| v.and_then(|s| s.checked_mul(1000)).and_then(representable))
                .collect())
        }
        _ => {
            let text = series.cast(&DataType::String)?;
            let raw: Vec<Option<&str>> = text.str()?.into_iter().collect();
            Ok(raw
                .par_iter()
                .map(|v| {
                    v.and_then(parse_timestamp)
                        .map(|ts| ts.and_utc().timestamp_millis())
                })
                .collect())
        }
    }
}

/// Build a `Datetime(ms)` series from epoch milliseconds.
pub fn datetime_series(name: &str, millis: &[Option<i64>]) -> Series {
    Int64Chunked::from_slice_options(name, millis)
        .into_datetime(TimeUnit::Milliseconds, None)
        .into_series()
}

fn year_month_millis(year: &Series, month: &Series) -> Result<Vec<Option<i64>>> {
    let years = year.cast(&DataType::Int32)?;
    let months = month.cast(&DataType::String)?;
    Ok(years
        .i32()?
        .into_iter()
        .zip(months.str()?.into_iter())
        .map(|(y, m)| {
            let month = resolve_month(m?)?;
            NaiveDate::from_ymd_opt(y?, month, 1)?
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_millis())
        })
        .collect())
}

/// Normalize a raw power table to `(timestamp, power)`.
///
/// Rows whose timestamp or power cannot be read are dropped. A non-empty
/// table whose explicit timestamp column yields no readable value is a schema
/// error; a Year/Month table with no resolvable month just comes out empty.
pub fn normalize_power(raw: &DataFrame) -> Result<DataFrame> {
    let names = raw.get_column_names();

    let (millis, basis) = if let Some(ts) = find_column(&names, TIMESTAMP) {
        (epoch_millis(raw.column(ts)?)?, TimeBasis::Timestamp)
    } else if let (Some(y), Some(m)) = (find_column(&names, YEAR), find_column(&names, MONTH)) {
        (
            year_month_millis(raw.column(y)?, raw.column(m)?)?,
            TimeBasis::YearMonth,
        )
    } else {
        return Err(ForecastError::schema("no usable time basis"));
    };

    let power_col = POWER_COLUMN
        .resolve(&names)
        .ok_or_else(|| ForecastError::schema("no usable power column"))?;
    let power = raw.column(power_col)?.cast(&DataType::Float64)?;
    let power: Vec<Option<f64>> = power.f64()?.into_iter().collect();

    let valid_timestamps = millis.iter().filter(|m| m.is_some()).count();
    if basis == TimeBasis::Timestamp && raw.height() > 0 && valid_timestamps == 0 {
        return Err(ForecastError::schema(format!(
            "no row has a usable timestamp ({:?} basis, {} rows)",
            basis,
            raw.height()
        )));
    }

    let keep: Vec<bool> = millis
        .iter()
        .zip(power.iter())
        .map(|(t, p)| t.is_some() && p.is_some())
        .collect();
    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        warn!(
            dropped,
            rows = raw.height(),
            "dropping power rows without a usable timestamp or power value"
        );
    }
    debug!(?basis, power_column = power_col, "normalized power table");

    let table = DataFrame::new(vec![
        datetime_series(TIMESTAMP, &millis),
        Float64Chunked::from_slice_options(POWER, &power).into_series(),
    ])?;
    Ok(table.filter(&BooleanChunked::from_slice("keep", &keep))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use proptest::prelude::*;
    use rstest::rstest;

    fn timestamps(df: &DataFrame) -> Vec<NaiveDateTime> {
        epoch_millis(df.column(TIMESTAMP).unwrap())
            .unwrap()
            .into_iter()
            .map(|ms| DateTime::from_timestamp_millis(ms.unwrap()).unwrap().naive_utc())
            .collect()
    }

    #[rstest]
    #[case("January", 1)]
    #[case("feb", 2)]
    #[case("MARCH", 3)]
    #[case("Apr", 4)]
    #[case("may", 5)]
    #[case("June", 6)]
    #[case("jul", 7)]
    #[case("AUGUST", 8)]
    #[case("Sept", 9)]
    #[case("sep", 9)]
    #[case("October", 10)]
    #[case(" nov ", 11)]
    #[case("December", 12)]
    #[case("7", 7)]
    #[case("12.0", 12)]
    fn test_resolve_month(#[case] raw: &str, #[case] expected: u32) {
        assert_eq!(resolve_month(raw), Some(expected));
    }

    #[rstest]
    #[case("Smarch")]
    #[case("13")]
    #[case("0")]
    #[case("")]
    #[case("2.5")]
    fn test_unresolvable_month(#[case] raw: &str) {
        assert_eq!(resolve_month(raw), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-05 14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05 14:30"), Some(expected));
        assert_eq!(parse_timestamp("2024/03/05 14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T15:30:00+01:00"), Some(expected));

        let midnight = parse_timestamp("2024-03-05").unwrap();
        assert_eq!(midnight.hour(), 0);
        assert_eq!(midnight.day(), 5);

        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("   "), None);
    }

    #[test]
    fn test_normalize_timestamp_basis() {
        let raw = df!(
            "timestamp" => &["2024-01-01 00:00:00", "2024-01-01 01:00:00"],
            "Power_Draw" => &[1.5, 2.5]
        )
        .unwrap();

        let out = normalize_power(&raw).unwrap();
        assert_eq!(out.get_column_names(), vec![TIMESTAMP, POWER]);
        assert_eq!(out.height(), 2);
        assert_eq!(timestamps(&out)[1].hour(), 1);
    }

    #[test]
    fn test_normalize_year_month_basis() {
        let raw = df!(
            "Year" => &[2023i64, 2023, 2023, 2024],
            "Month" => &["Jan", "february", "Smarch", "12"],
            "Monthly_kWh" => &[100.0, 110.0, 120.0, 130.0]
        )
        .unwrap();

        let out = normalize_power(&raw).unwrap();
        assert_eq!(out.height(), 3);
        let ts = timestamps(&out);
        assert_eq!((ts[0].year(), ts[0].month(), ts[0].day()), (2023, 1, 1));
        assert_eq!(ts[1].month(), 2);
        assert_eq!((ts[2].year(), ts[2].month()), (2024, 12));

        let power: Vec<f64> = out.column(POWER).unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(power, vec![100.0, 110.0, 130.0]);
    }

    #[test]
    fn test_numeric_month_column() {
        let raw = df!(
            "Year" => &[2022i64, 2022],
            "Month" => &[3i64, 4],
            "usage" => &[5.0, 6.0]
        )
        .unwrap();

        let out = normalize_power(&raw).unwrap();
        let ts = timestamps(&out);
        assert_eq!(ts[0].month(), 3);
        assert_eq!(ts[1].month(), 4);
    }

    #[test]
    fn test_usage_preferred_over_monthly_kwh() {
        let raw = df!(
            "Year" => &[2022i64],
            "Month" => &["Jan"],
            "Monthly_kWh" => &[1.0],
            "USAGE" => &[9.0]
        )
        .unwrap();

        let out = normalize_power(&raw).unwrap();
        let power = out.column(POWER).unwrap().f64().unwrap().get(0);
        assert_eq!(power, Some(9.0));
    }

    #[test]
    fn test_no_time_basis() {
        let raw = df!("Month" => &["Jan"], "power" => &[1.0]).unwrap();
        let err = normalize_power(&raw).unwrap_err();
        assert!(err.is_schema());
        assert!(err.to_string().contains("no usable time basis"));
    }

    #[test]
    fn test_no_power_column() {
        let raw = df!("timestamp" => &["2024-01-01"], "kwh_total" => &[1.0]).unwrap();
        let err = normalize_power(&raw).unwrap_err();
        assert!(err.to_string().contains("no usable power column"));
    }

    #[test]
    fn test_all_timestamps_invalid() {
        let raw = df!(
            "timestamp" => &["not a date", "still not"],
            "power" => &[1.0, 2.0]
        )
        .unwrap();
        assert!(normalize_power(&raw).unwrap_err().is_schema());
    }

    #[test]
    fn test_partially_invalid_rows_are_dropped() {
        let raw = df!(
            "timestamp" => &[Some("2024-01-01"), Some("garbage"), None, Some("2024-01-04")],
            "power" => &[Some(1.0), Some(2.0), Some(3.0), None]
        )
        .unwrap();

        let out = normalize_power(&raw).unwrap();
        assert_eq!(out.height(), 1);
    }

    #[test]
    fn test_unresolvable_months_give_empty_table() {
        let raw = df!(
            "Year" => &[2023i64, 2023],
            "Month" => &["Smarch", "13"],
            "Monthly_kWh" => &[1.0, 2.0]
        )
        .unwrap();

        let out = normalize_power(&raw).unwrap();
        assert_eq!(out.height(), 0);
        assert_eq!(out.get_column_names(), vec![TIMESTAMP, POWER]);
    }

    #[test]
    fn test_out_of_range_integer_timestamp_is_dropped() {
        let mut secs: Vec<i64> = (0..30).map(|i| 1_704_067_200 + i * 3600).collect();
        secs.push(10_000_000_000_000);
        let power: Vec<f64> = (0..31).map(|i| i as f64).collect();
        let raw = df!("timestamp" => secs, "power" => power).unwrap();

        let out = normalize_power(&raw).unwrap();
        assert_eq!(out.height(), 30);
        assert_eq!(timestamps(&out)[29].hour(), 5);
    }

    #[test]
    fn test_out_of_range_datetime_is_dropped() {
        let mut millis: Vec<Option<i64>> = (0..30).map(|i| Some(1_704_067_200_000 + i * 3_600_000)).collect();
        millis.push(Some(i64::MAX / 2));
        let power: Vec<f64> = (0..31).map(|i| i as f64).collect();
        let raw = DataFrame::new(vec![
            datetime_series("Timestamp", &millis),
            Series::new("power", power),
        ])
        .unwrap();

        assert_eq!(epoch_millis(raw.column("Timestamp").unwrap()).unwrap()[30], None);
        assert_eq!(normalize_power(&raw).unwrap().height(), 30);
    }

    proptest! {
        #[test]
        fn prop_output_rows_are_complete(
            rows in proptest::collection::vec(
                (proptest::option::of(0u32..2000), proptest::option::of(-1e6f64..1e6)),
                1..40,
            )
        ) {
            let ts: Vec<Option<String>> = rows
                .iter()
                .map(|(day, _)| day.map(|d| {
                    (NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(d as i64))
                        .format("%Y-%m-%d")
                        .to_string()
                }))
                .collect();
            let ts_refs: Vec<Option<&str>> = ts.iter().map(|t| t.as_deref()).collect();
            let power: Vec<Option<f64>> = rows.iter().map(|(_, p)| *p).collect();
            let raw = DataFrame::new(vec![
                Series::new("timestamp", ts_refs),
                Series::new("value", power),
            ])
            .unwrap();

            let expected = rows.iter().filter(|(d, p)| d.is_some() && p.is_some()).count();
            match normalize_power(&raw) {
                Ok(out) => {
                    prop_assert_eq!(out.height(), expected);
                    prop_assert_eq!(out.column(TIMESTAMP).unwrap().null_count(), 0);
                    prop_assert_eq!(out.column(POWER).unwrap().null_count(), 0);
                }
                Err(err) => {
                    prop_assert!(err.is_schema());
                    prop_assert!(rows.iter().all(|(d, _)| d.is_none()));
                }
            }
        }
    }
}
