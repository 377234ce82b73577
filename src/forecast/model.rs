//! Seam between the order search and the estimation routine.

use serde::Serialize;
use std::fmt::Debug;

use super::order::InformationCriterion;
use super::FitError;
use crate::domain::ModelOrder;

/// One step of a model's predictive distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub mean: f64,
    pub variance: f64,
}

/// A model estimated on one series.
pub trait FittedModel: Debug + Send + Sync {
    fn order(&self) -> ModelOrder;

    /// Gaussian log-likelihood at the estimate.
    fn log_likelihood(&self) -> f64;

    /// Estimated parameters, counting the innovation variance.
    fn n_params(&self) -> usize;

    /// Number of residuals the likelihood is computed from.
    fn n_obs(&self) -> usize;

    fn sigma2(&self) -> f64;

    /// One-step-ahead in-sample residuals, oldest first.
    fn residuals(&self) -> &[f64];

    /// One-step-ahead fitted values for the last `n_obs` observations.
    fn fitted_values(&self) -> Vec<f64>;

    fn criterion(&self, criterion: InformationCriterion) -> f64 {
        criterion.evaluate(self.log_likelihood(), self.n_params(), self.n_obs())
    }

    /// Predictive mean and variance for the next `horizon` steps.
    fn predict(&self, horizon: usize) -> Result<Vec<Prediction>, FitError>;
}

/// Estimates a model of a given order.
#[cfg_attr(test, mockall::automock)]
pub trait ModelFitter: Send + Sync {
    fn fit(&self, values: &[f64], order: ModelOrder) -> Result<Box<dyn FittedModel>, FitError>;
}
