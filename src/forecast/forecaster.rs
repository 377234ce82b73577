use chrono::Utc;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::{info, warn};
use validator::Validate;

use super::metrics::{FitMetrics, FitQuality};
use super::model::ModelFitter;
use super::order::{InformationCriterion, SearchBounds};
use super::sarima::SarimaFitter;
use super::search::{OrderSearch, SearchReport};
use super::ForecastError;
use crate::domain::{Forecast, ForecastPoint, Series};
use crate::error::ResampleError;

/// Default coverage of the prediction intervals.
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// A forecast together with the search that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastRun {
    pub forecast: Forecast,
    pub report: SearchReport,
    /// In-sample one-step-ahead accuracy of the winning model
    pub metrics: Option<FitMetrics>,
}

/// Automatic seasonal ARIMA forecaster.
pub struct Forecaster<F: ModelFitter = SarimaFitter> {
    fitter: F,
    bounds: SearchBounds,
    criterion: InformationCriterion,
    confidence: f64,
}

impl Forecaster<SarimaFitter> {
    pub fn sarima(bounds: SearchBounds) -> Self {
        Self::new(SarimaFitter::from_bounds(&bounds), bounds)
    }
}

impl<F: ModelFitter> Forecaster<F> {
    pub fn new(fitter: F, bounds: SearchBounds) -> Self {
        Self {
            fitter,
            bounds,
            criterion: InformationCriterion::default(),
            confidence: DEFAULT_CONFIDENCE,
        }
    }

    pub fn with_criterion(mut self, criterion: InformationCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn bounds(&self) -> &SearchBounds {
        &self.bounds
    }

    /// Select a model for `series` and predict `horizon` steps past its
    /// last timestamp. `seasonal_period` of 0 or 1 searches non-seasonal
    /// orders only.
    pub fn forecast(
        &self,
        series: &Series,
        horizon: usize,
        seasonal_period: usize,
    ) -> Result<ForecastRun, ForecastError> {
        self.check(series, horizon)?;
        let values = series.values();

        let selection = OrderSearch::new(&self.fitter, &self.bounds, self.criterion)
            .run(values, seasonal_period)?;
        let model = selection.model;
        let predictions = model.predict(horizon)?;

        let z = Normal::new(0.0, 1.0)
            .map_err(|_| ForecastError::InvalidConfidence(self.confidence))?
            .inverse_cdf(0.5 + self.confidence / 2.0);

        let Some(last) = series.last_timestamp() else {
            return Err(ForecastError::EmptySeries(series.name.clone()));
        };
        let points = predictions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let step = u32::try_from(i + 1).map_err(|_| ResampleError::Overflow(last))?;
                let timestamp = series.frequency.advance(last, step)?;
                let half_width = z * p.variance.max(0.0).sqrt();
                Ok(ForecastPoint {
                    timestamp,
                    value: p.mean,
                    lower: p.mean - half_width,
                    upper: p.mean + half_width,
                })
            })
            .collect::<Result<Vec<_>, ForecastError>>()?;

        let n_obs = model.n_obs().min(values.len());
        let observed = &values[values.len() - n_obs..];
        let metrics = match FitMetrics::calculate(observed, &model.fitted_values()) {
            Ok(m) => {
                info!(order = %model.order(), quality = %m.quality(), "in-sample fit: {}", m);
                if matches!(m.quality(), FitQuality::Poor | FitQuality::VeryPoor) {
                    warn!(mape = m.mape, "selected model fits the history poorly");
                }
                Some(m)
            }
            Err(e) => {
                warn!(error = %e, "fit metrics unavailable");
                None
            }
        };

        let forecast = Forecast {
            points,
            order: model.order(),
            criterion: selection.criterion,
            confidence: self.confidence,
            generated_at: Utc::now(),
            source: series.name.clone(),
        };
        info!(
            series = %series.name,
            order = %forecast.order,
            horizon,
            "forecast produced"
        );

        Ok(ForecastRun {
            forecast,
            report: selection.report,
            metrics,
        })
    }

    fn check(&self, series: &Series, horizon: usize) -> Result<(), ForecastError> {
        if series.is_empty() {
            return Err(ForecastError::EmptySeries(series.name.clone()));
        }
        if let Some(position) = series.values().iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::NonFiniteValue {
                name: series.name.clone(),
                position,
            });
        }
        for (position, pair) in series.index().windows(2).enumerate() {
            let expected = series.frequency.advance(pair[0], 1)?;
            if pair[1] != expected {
                return Err(ForecastError::IrregularSeries {
                    name: series.name.clone(),
                    position: position + 1,
                    expected,
                    found: pair[1],
                });
            }
        }
        if horizon == 0 {
            return Err(ForecastError::ZeroHorizon);
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(ForecastError::InvalidConfidence(self.confidence));
        }
        self.bounds
            .validate()
            .map_err(|e| ForecastError::InvalidBounds(e.to_string()))
    }
}

/// Forecast `horizon` steps of `series` with the SARIMA fitter, AIC and
/// 95% intervals.
pub fn forecast(
    series: &Series,
    horizon: usize,
    bounds: &SearchBounds,
    seasonal_period: usize,
) -> Result<Forecast, ForecastError> {
    Forecaster::sarima(bounds.clone())
        .forecast(series, horizon, seasonal_period)
        .map(|run| run.forecast)
}
