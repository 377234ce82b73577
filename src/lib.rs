//! Household energy time-series engine: signal cleaning, calendar
//! resampling, seasonal aggregation and automatic SARIMA forecasting of
//! monthly consumption.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod ingest;
pub mod resample;
pub mod seasons;
pub mod telemetry;

pub use config::Config;
pub use engine::{Engine, View, ViewKind, ViewRequest};
pub use error::{DataWarning, EngineError, Outcome};
