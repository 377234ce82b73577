pub mod forecaster;
pub mod metrics;
pub mod model;
pub mod order;
pub mod sarima;
pub mod search;
pub mod stationarity;

pub use forecaster::*;
pub use metrics::*;
pub use model::*;
pub use order::*;
pub use sarima::*;
pub use search::*;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::{Channel, Frequency, Series, Table};
use crate::error::{Outcome, ResampleError};
use crate::resample::resample;

/// Why a single candidate model could not be used.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FitError {
    #[error("did not converge: {0}")]
    NonConvergent(String),

    #[error("needs at least {needed} observations, got {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("numerically unstable: {0}")]
    Unstable(String),

    #[error("residuals are autocorrelated (Ljung-Box p = {p_value:.4} over {lags} lags)")]
    InadequateResiduals { p_value: f64, lags: usize },
}

/// Failures of a forecast request. None of them affect other views.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Model selection failed: none of {tried} candidate orders could be fitted")]
    ModelSelection { tried: usize, report: Box<SearchReport> },

    #[error("Series '{0}' is empty")]
    EmptySeries(String),

    #[error("Series '{name}' has a non-finite value at position {position}")]
    NonFiniteValue { name: String, position: usize },

    #[error("Series '{name}' skips a step at position {position}: expected {expected}, found {found}")]
    IrregularSeries {
        name: String,
        position: usize,
        expected: NaiveDateTime,
        found: NaiveDateTime,
    },

    #[error("Forecast horizon must be at least 1")]
    ZeroHorizon,

    #[error("Confidence level {0} is outside (0, 1)")]
    InvalidConfidence(f64),

    #[error("Invalid search bounds: {0}")]
    InvalidBounds(String),

    #[error("Prediction failed: {0}")]
    Prediction(#[from] FitError),

    #[error(transparent)]
    Timestamp(#[from] ResampleError),
}

/// Name of the series built by [`monthly_total_series`].
pub const MONTHLY_TOTAL: &str = "total_consumption";

/// Resample to calendar months and sum the four metering channels.
///
/// Channels missing from the table contribute nothing to the total. Months
/// without readings are absent from the series and reported as
/// `EmptyWindow` warnings; the forecaster rejects such a series.
pub fn monthly_total_series(table: &Table) -> Result<Outcome<Series>, ResampleError> {
    let monthly = resample(table, Frequency::MONTHLY)?;
    Ok(monthly.map(|t| {
        let totals = t.row_sums(&Channel::METERS);
        Series::from_pairs(
            MONTHLY_TOTAL,
            Frequency::MONTHLY,
            t.index().iter().copied().zip(totals),
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2007, m, d)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_monthly_total_sums_meters_of_monthly_means() {
        let table = Table::new(vec![at(1, 1), at(1, 2), at(2, 1)])
            .with_column(Channel::SubMetering1, vec![1.0, 3.0, 5.0])
            .unwrap()
            .with_column(Channel::SubMetering2, vec![1.0, 1.0, 1.0])
            .unwrap()
            .with_column(Channel::NotSubMetering, vec![10.0, 20.0, 30.0])
            .unwrap()
            .with_column(Channel::Voltage, vec![240.0; 3])
            .unwrap();
        let series = monthly_total_series(&table).unwrap().into_inner();
        assert_eq!(series.name, MONTHLY_TOTAL);
        assert_eq!(series.values(), &[2.0 + 1.0 + 15.0, 5.0 + 1.0 + 30.0]);
        assert_eq!(
            series.index()[1],
            NaiveDate::from_ymd_opt(2007, 2, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_fit_error_messages() {
        let e = FitError::InadequateResiduals {
            p_value: 0.001,
            lags: 24,
        };
        assert!(e.to_string().contains("24 lags"));
    }
}
