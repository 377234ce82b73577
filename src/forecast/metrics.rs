//! In-sample accuracy of the selected model.
//!
//! Compares the observed series with the model's one-step-ahead fitted
//! values over the span the likelihood was computed on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One-step-ahead fit accuracy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Square Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error (%) over non-zero observations
    pub mape: f64,
    /// R² against the mean of the observations
    pub r2: f64,
    /// Mean signed error (observed minus fitted)
    pub bias: f64,
    pub max_error: f64,
    pub sample_count: usize,
}

impl FitMetrics {
    pub fn calculate(actual: &[f64], fitted: &[f64]) -> Result<Self, FitMetricsError> {
        if actual.len() != fitted.len() {
            return Err(FitMetricsError::DimensionMismatch {
                actual: actual.len(),
                fitted: fitted.len(),
            });
        }
        if actual.is_empty() {
            return Err(FitMetricsError::EmptyData);
        }

        let n = actual.len() as f64;
        let errors: Vec<f64> = actual.iter().zip(fitted).map(|(a, f)| a - f).collect();

        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let sse: f64 = errors.iter().map(|e| e * e).sum();
        let rmse = (sse / n).sqrt();
        let bias = errors.iter().sum::<f64>() / n;
        let max_error = errors.iter().fold(0.0f64, |acc, e| acc.max(e.abs()));

        // Percentage errors skip observations too close to zero.
        let percentages: Vec<f64> = actual
            .iter()
            .zip(&errors)
            .filter(|(a, _)| a.abs() > 1e-6)
            .map(|(a, e)| e.abs() / a.abs() * 100.0)
            .collect();
        let mape = if percentages.is_empty() {
            0.0
        } else {
            percentages.iter().sum::<f64>() / percentages.len() as f64
        };

        let mean_actual = actual.iter().sum::<f64>() / n;
        let sst: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
        let r2 = if sst > 1e-10 { 1.0 - sse / sst } else { 1.0 };

        Ok(Self {
            mae,
            rmse,
            mape,
            r2,
            bias,
            max_error,
            sample_count: actual.len(),
        })
    }

    pub fn quality(&self) -> FitQuality {
        match self.mape {
            m if m < 5.0 => FitQuality::Excellent,
            m if m < 10.0 => FitQuality::Good,
            m if m < 20.0 => FitQuality::Fair,
            m if m < 50.0 => FitQuality::Poor,
            _ => FitQuality::VeryPoor,
        }
    }
}

impl fmt::Display for FitMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE={:.3}, RMSE={:.3}, MAPE={:.2}%, R²={:.3}, quality={}",
            self.mae,
            self.rmse,
            self.mape,
            self.r2,
            self.quality()
        )
    }
}

/// Fit quality bands by MAPE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FitQuality {
    Excellent, // < 5%
    Good,      // 5-10%
    Fair,      // 10-20%
    Poor,      // 20-50%
    VeryPoor,  // > 50%
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FitMetricsError {
    #[error("Dimension mismatch: actual={actual}, fitted={fitted}")]
    DimensionMismatch { actual: usize, fitted: usize },

    #[error("Empty data provided")]
    EmptyData,
}
