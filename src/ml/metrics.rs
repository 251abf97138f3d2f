//! Regression Metrics
//!
//! Held-out accuracy of a fitted model. RMSE and MAE are the headline numbers;
//! MAPE, R² and the worst absolute error are reported alongside.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ForecastError;

/// Held-out evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Root Mean Square Error
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    /// Mean Absolute Error
    #[serde(rename = "MAE")]
    pub mae: f64,
    /// Mean Absolute Percentage Error (%), over non-zero actuals
    pub mape: f64,
    /// R² (coefficient of determination)
    pub r2: f64,
    /// Largest absolute error observed
    pub max_error: f64,
    /// Number of samples evaluated
    pub sample_count: usize,
}

impl EvaluationMetrics {
    /// Calculate metrics from actual and predicted values
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self, MetricsError> {
        if actual.len() != predicted.len() {
            return Err(MetricsError::DimensionMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }

        if actual.is_empty() {
            return Err(MetricsError::EmptyData);
        }

        let n = actual.len() as f64;
        let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();

        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let rmse = mse.sqrt();

        let percentage_errors: Vec<f64> = actual
            .iter()
            .zip(&errors)
            .filter(|(a, _)| a.abs() > 1e-6)
            .map(|(a, e)| (e.abs() / a.abs()) * 100.0)
            .collect();
        let mape = if percentage_errors.is_empty() {
            0.0
        } else {
            percentage_errors.iter().sum::<f64>() / percentage_errors.len() as f64
        };

        let mean_actual = actual.iter().sum::<f64>() / n;
        let total_variance: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
        let residual_variance = mse * n;
        let r2 = if total_variance > 1e-10 {
            1.0 - (residual_variance / total_variance)
        } else {
            0.0
        };

        let max_error = errors.iter().map(|e| e.abs()).fold(0.0f64, f64::max);

        Ok(Self {
            rmse,
            mae,
            mape,
            r2,
            max_error,
            sample_count: actual.len(),
        })
    }
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RMSE={:.4}, MAE={:.4}, MAPE={:.2}%, R²={:.3}, n={}",
            self.rmse, self.mae, self.mape, self.r2, self.sample_count
        )
    }
}

/// Metric calculation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetricsError {
    #[error("Dimension mismatch: actual={actual}, predicted={predicted}")]
    DimensionMismatch { actual: usize, predicted: usize },

    #[error("Empty data provided")]
    EmptyData,
}

impl From<MetricsError> for ForecastError {
    fn from(err: MetricsError) -> Self {
        ForecastError::Training(err.to_string())
    }
}
