use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Job-level failures. Any of these aborts the run.
///
/// Per-row problems (an unparseable timestamp, an unknown month name) are not
/// errors: those rows are nulled and dropped by the stage that sees them.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The input table has no usable time basis or power column.
    #[error("schema error: {0}")]
    Schema(String),

    /// No usable features, or the train/test split left a partition empty.
    #[error("training error: {0}")]
    Training(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataframe error: {0}")]
    Polars(#[from] PolarsError),

    #[error("model serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ForecastError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    pub fn is_training(&self) -> bool {
        matches!(self, Self::Training(_))
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
