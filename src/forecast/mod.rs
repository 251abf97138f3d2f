//! Feature engineering stages
//!
//! Raw tables flow strictly forward through these stages:
//! [`schema::normalize_power`] → [`features::FeatureBuilder`] →
//! [`dataset::assemble`], and [`engine::ForecastEngine`] drives them together
//! with training.

pub mod columns;
pub mod dataset;
pub mod engine;
pub mod features;
pub mod io;
pub mod schema;
pub mod weather;

pub use dataset::{assemble, FeatureTable};
pub use engine::{ForecastEngine, RunSummary};
pub use features::FeatureBuilder;
pub use schema::normalize_power;
pub use weather::normalize_weather;
