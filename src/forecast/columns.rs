//! Column naming tables
//!
//! Every rule that maps an input column name onto a canonical one lives here,
//! so the normalizer and the weather join share a single, testable contract.

use strum::{AsRefStr, EnumIter, IntoEnumIterator, IntoStaticStr};

pub const TIMESTAMP: &str = "timestamp";
pub const POWER: &str = "power";
pub const TARGET: &str = "target";
pub const PREDICTION: &str = "prediction";
pub const YEAR: &str = "Year";
pub const MONTH: &str = "Month";

/// Canonical feature columns, in the order the assembler emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum FeatureColumn {
    #[strum(serialize = "hour")]
    Hour,
    #[strum(serialize = "day_of_week")]
    DayOfWeek,
    #[strum(serialize = "month")]
    Month,
    #[strum(serialize = "lag1_power")]
    Lag1Power,
    #[strum(serialize = "temperature")]
    Temperature,
    #[strum(serialize = "humidity")]
    Humidity,
    #[strum(serialize = "cloud_cover")]
    CloudCover,
}

impl FeatureColumn {
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn all() -> impl Iterator<Item = FeatureColumn> {
        FeatureColumn::iter()
    }
}

/// Exact-name (case-insensitive) synonyms for one canonical column, with an
/// optional case-sensitive last resort.
#[derive(Debug, Clone, Copy)]
pub struct SynonymTable {
    pub canonical: &'static str,
    pub synonyms: &'static [&'static str],
    pub fallback: Option<&'static str>,
}

impl SynonymTable {
    /// Pick the source column for this canonical name.
    ///
    /// The first column in table order that matches any synonym wins; only if
    /// none match is the fallback column considered.
    pub fn resolve<'a>(&self, columns: &[&'a str]) -> Option<&'a str> {
        columns
            .iter()
            .find(|c| {
                let lower = c.to_lowercase();
                self.synonyms.iter().any(|s| *s == lower)
            })
            .or_else(|| {
                self.fallback
                    .and_then(|fb| columns.iter().find(|c| **c == fb))
            })
            .copied()
    }
}

pub const POWER_COLUMN: SynonymTable = SynonymTable {
    canonical: POWER,
    synonyms: &["power", "power_draw", "mw", "value", "usage", "power_usage"],
    fallback: Some("Monthly_kWh"),
};

/// Loosely named weather signals, matched by substring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, AsRefStr)]
pub enum WeatherField {
    #[strum(serialize = "temperature")]
    Temperature,
    #[strum(serialize = "humidity")]
    Humidity,
    #[strum(serialize = "cloud_cover")]
    CloudCover,
}

impl WeatherField {
    fn patterns(self) -> &'static [&'static str] {
        match self {
            WeatherField::Temperature => &["temp"],
            WeatherField::Humidity => &["humid"],
            WeatherField::CloudCover => &["cloud", "cover"],
        }
    }

    /// First field (temperature, humidity, cloud_cover) whose pattern occurs in
    /// the lowercased column name.
    pub fn classify(column: &str) -> Option<WeatherField> {
        let lower = column.to_lowercase();
        WeatherField::iter().find(|f| f.patterns().iter().any(|p| lower.contains(p)))
    }

    pub fn feature(self) -> FeatureColumn {
        match self {
            WeatherField::Temperature => FeatureColumn::Temperature,
            WeatherField::Humidity => FeatureColumn::Humidity,
            WeatherField::CloudCover => FeatureColumn::CloudCover,
        }
    }
}

/// Case-insensitive exact lookup of a column name.
pub fn find_column<'a>(columns: &[&'a str], wanted: &str) -> Option<&'a str> {
    columns
        .iter()
        .find(|c| c.eq_ignore_ascii_case(wanted))
        .copied()
}
