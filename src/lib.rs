//! Power consumption forecasting.
//!
//! Raw power readings (and optionally weather observations) are normalized,
//! turned into calendar/lag/weather features, assembled into a training table
//! and used to fit a gradient-boosted regressor whose held-out accuracy is
//! reported alongside the persisted model and predictions.

pub mod config;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod session;
pub mod telemetry;

pub use config::Config;
pub use error::{ForecastError, Result};
pub use forecast::{ForecastEngine, RunSummary};
pub use ml::{EvaluationMetrics, PipelineModel};
pub use session::ForecastSession;
