use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seasonal ARIMA order (p, d, q)(P, D, Q)[m].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    #[serde(rename = "P")]
    pub seasonal_p: usize,
    #[serde(rename = "D")]
    pub seasonal_d: usize,
    #[serde(rename = "Q")]
    pub seasonal_q: usize,
    /// Seasonal period; 0 or 1 means non-seasonal.
    pub m: usize,
}

impl ModelOrder {
    pub fn new(
        (p, d, q): (usize, usize, usize),
        (seasonal_p, seasonal_d, seasonal_q): (usize, usize, usize),
        m: usize,
    ) -> Self {
        Self {
            p,
            d,
            q,
            seasonal_p,
            seasonal_d,
            seasonal_q,
            m,
        }
    }

    pub fn is_seasonal(&self) -> bool {
        self.m > 1
    }

    /// Sum of all six orders, used to prefer simpler models on ties.
    pub fn total(&self) -> usize {
        self.p + self.d + self.q + self.seasonal_p + self.seasonal_d + self.seasonal_q
    }

    /// Sum of the ARMA orders only (p + q + P + Q).
    pub fn arma_total(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }
}

impl fmt::Display for ModelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_seasonal() {
            write!(
                f,
                "SARIMA({},{},{})({},{},{})[{}]",
                self.p, self.d, self.q, self.seasonal_p, self.seasonal_d, self.seasonal_q, self.m
            )
        } else {
            write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
        }
    }
}

/// One forecasted step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: NaiveDateTime,
    /// Mean of the predictive distribution
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Multi-step forecast produced by the selected model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub points: Vec<ForecastPoint>,

    /// Order of the model that produced the points
    pub order: ModelOrder,

    /// Value of the selection criterion for the winning model
    pub criterion: f64,

    /// Coverage of the `lower`/`upper` bounds (e.g. 0.95)
    pub confidence: f64,

    /// Timestamp when forecast was generated
    pub generated_at: DateTime<Utc>,

    /// Name of the forecasted series
    pub source: String,
}

impl Forecast {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.points.iter().map(|p| p.timestamp).collect()
    }
}
