//! Feature engineering for forecasting models
//!
//! Derives calendar and lag features from a normalized power table and joins
//! normalized weather signals onto it. Everything here is one lazy polars
//! plan: stable sort, calendar and lag columns, then a left join.

use polars::prelude::*;
use tracing::debug;

use super::columns::{FeatureColumn, POWER, TIMESTAMP};
use crate::error::{ForecastError, Result};

/// Day of week with 1=Sunday through 7=Saturday, from polars' ISO weekday
/// (1=Monday through 7=Sunday).
fn day_of_week_from_sunday(ts: Expr) -> Expr {
    (ts.dt().weekday().cast(DataType::Int32) % lit(7)) + lit(1)
}

/// Builds the feature table from a normalized power table and an optional
/// normalized weather table.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Output is sorted by timestamp (equal timestamps keep input order) and
    /// carries `timestamp`, `power`, `hour`, `day_of_week`, `month`,
    /// `lag1_power` and any joined weather columns. `lag1_power` is null on
    /// the first row.
    pub fn build(&self, power: &DataFrame, weather: Option<&DataFrame>) -> Result<DataFrame> {
        if power.column(TIMESTAMP)?.null_count() > 0 {
            return Err(ForecastError::schema(
                "power table has null timestamps; normalize it first",
            ));
        }

        let ts = || col(TIMESTAMP);
        let mut plan = power
            .select([TIMESTAMP, POWER])?
            .lazy()
            .sort(
                TIMESTAMP,
                SortOptions {
                    maintain_order: true,
                    ..Default::default()
                },
            )
            .with_columns([
                ts().dt().hour().cast(DataType::Int32).alias(FeatureColumn::Hour.name()),
                day_of_week_from_sunday(ts()).alias(FeatureColumn::DayOfWeek.name()),
                ts().dt().month().cast(DataType::Int32).alias(FeatureColumn::Month.name()),
                col(POWER)
                    .cast(DataType::Float64)
                    .shift(lit(1))
                    .alias(FeatureColumn::Lag1Power.name()),
            ]);

        if let Some(weather) = weather {
            plan = plan.join(
                weather.clone().lazy(),
                [col(TIMESTAMP)],
                [col(TIMESTAMP)],
                JoinArgs::new(JoinType::Left),
            );
        }

        let table = plan.collect()?;
        debug!(
            rows = table.height(),
            columns = ?table.get_column_names(),
            joined_weather = weather.is_some(),
            "built feature table"
        );
        Ok(table)
    }
}
