//! Search space and selection criterion for the order search.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use strum::{Display, EnumString};
use validator::{Validate, ValidationError};

use crate::domain::ModelOrder;

/// Information criterion minimized by the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum InformationCriterion {
    #[default]
    Aic,
    Aicc,
    Bic,
}

impl InformationCriterion {
    /// Criterion value for a fit with log-likelihood `loglik`, `k` estimated
    /// parameters (including the innovation variance) and `n` residuals.
    pub fn evaluate(&self, loglik: f64, k: usize, n: usize) -> f64 {
        let k = k as f64;
        let n = n as f64;
        let aic = -2.0 * loglik + 2.0 * k;
        match self {
            Self::Aic => aic,
            Self::Aicc => {
                if n - k - 1.0 > 0.0 {
                    aic + 2.0 * k * (k + 1.0) / (n - k - 1.0)
                } else {
                    f64::INFINITY
                }
            }
            Self::Bic => -2.0 * loglik + k * n.ln(),
        }
    }
}

/// Bounds of the seasonal ARIMA order search.
///
/// Differencing orders are estimated from the data within
/// `[min_d, max_d]` / `[min_seasonal_d, max_seasonal_d]` unless fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_search_bounds"))]
#[serde(default)]
pub struct SearchBounds {
    /// Starting AR order for the stepwise search
    #[validate(range(max = 10))]
    pub start_p: usize,
    #[validate(range(max = 10))]
    pub start_q: usize,
    #[validate(range(max = 5))]
    pub start_seasonal_p: usize,
    #[validate(range(max = 5))]
    pub start_seasonal_q: usize,

    pub min_p: usize,
    #[validate(range(max = 10))]
    pub max_p: usize,
    pub min_d: usize,
    #[validate(range(max = 3))]
    pub max_d: usize,
    pub min_q: usize,
    #[validate(range(max = 10))]
    pub max_q: usize,

    pub min_seasonal_p: usize,
    #[validate(range(max = 5))]
    pub max_seasonal_p: usize,
    pub min_seasonal_d: usize,
    #[validate(range(max = 2))]
    pub max_seasonal_d: usize,
    pub min_seasonal_q: usize,
    #[validate(range(max = 5))]
    pub max_seasonal_q: usize,

    /// Cap on p + q + P + Q for any candidate
    #[validate(range(max = 20))]
    pub max_order: usize,

    /// Skip the differencing tests and use these orders
    pub fixed_d: Option<usize>,
    pub fixed_seasonal_d: Option<usize>,

    /// Stepwise neighbourhood search; exhaustive grid when false
    pub stepwise: bool,
    /// Upper limit on models fitted by the stepwise search
    #[validate(range(min = 1))]
    pub max_steps: usize,

    /// Significance level of the Ljung-Box residual check
    #[validate(range(min = 0.0, max = 1.0))]
    pub ljung_box_alpha: f64,
}

impl Default for SearchBounds {
    fn default() -> Self {
        Self {
            start_p: 2,
            start_q: 2,
            start_seasonal_p: 1,
            start_seasonal_q: 1,
            min_p: 0,
            max_p: 5,
            min_d: 0,
            max_d: 2,
            min_q: 0,
            max_q: 5,
            min_seasonal_p: 0,
            max_seasonal_p: 2,
            min_seasonal_d: 0,
            max_seasonal_d: 1,
            min_seasonal_q: 0,
            max_seasonal_q: 2,
            max_order: 5,
            fixed_d: None,
            fixed_seasonal_d: None,
            stepwise: true,
            max_steps: 100,
            ljung_box_alpha: 0.01,
        }
    }
}

impl SearchBounds {
    /// Whether an order lies inside every bound. Differencing orders are
    /// not checked here; they are fixed before the ARMA search starts.
    pub fn admits(&self, order: &ModelOrder) -> bool {
        let seasonal_ok = if order.is_seasonal() {
            (self.min_seasonal_p..=self.max_seasonal_p).contains(&order.seasonal_p)
                && (self.min_seasonal_q..=self.max_seasonal_q).contains(&order.seasonal_q)
        } else {
            order.seasonal_p == 0 && order.seasonal_q == 0
        };
        seasonal_ok
            && (self.min_p..=self.max_p).contains(&order.p)
            && (self.min_q..=self.max_q).contains(&order.q)
            && order.arma_total() <= self.max_order
    }

    pub fn clamp_d(&self, d: usize) -> usize {
        d.clamp(self.min_d, self.max_d)
    }

    pub fn clamp_seasonal_d(&self, d: usize) -> usize {
        d.clamp(self.min_seasonal_d, self.max_seasonal_d)
    }
}

fn validate_search_bounds(bounds: &SearchBounds) -> Result<(), ValidationError> {
    let pairs = [
        ("p", bounds.min_p, bounds.max_p),
        ("d", bounds.min_d, bounds.max_d),
        ("q", bounds.min_q, bounds.max_q),
        ("P", bounds.min_seasonal_p, bounds.max_seasonal_p),
        ("D", bounds.min_seasonal_d, bounds.max_seasonal_d),
        ("Q", bounds.min_seasonal_q, bounds.max_seasonal_q),
    ];
    for (name, min, max) in pairs {
        if min > max {
            let mut err = ValidationError::new("min_exceeds_max");
            err.message = Some(Cow::from(format!(
                "minimum {} order {} exceeds maximum {}",
                name, min, max
            )));
            return Err(err);
        }
    }
    let floor = bounds.min_p + bounds.min_q + bounds.min_seasonal_p + bounds.min_seasonal_q;
    if floor > bounds.max_order {
        let mut err = ValidationError::new("max_order_too_small");
        err.message = Some(Cow::from(format!(
            "max_order {} is below the sum of the minimum orders {}",
            bounds.max_order, floor
        )));
        return Err(err);
    }
    Ok(())
}
