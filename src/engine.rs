//! View dispatch over the retained original table.
//!
//! The engine owns the cleaned table produced at startup and never changes
//! it. Each view is a pure function of that table and its own request, so
//! a failing view leaves every other view untouched.

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use strum::{Display, EnumIter, EnumString};
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{Frequency, MeterSelection, Table};
use crate::error::{DataWarning, EngineError, Outcome};
use crate::forecast::{monthly_total_series, ForecastRun, Forecaster};
use crate::ingest::{clean_with, read_raw, read_raw_path, RawRows};
use crate::resample::resample;
use crate::seasons::{aggregate, SeasonGrouping, SeasonalSummary};

/// The views the presentation layer can ask for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ViewKind {
    AllData,
    BySeason,
    Predictions,
}

/// A view request with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewRequest {
    AllData {
        frequency: Frequency,
        meters: MeterSelection,
    },
    BySeason {
        grouping: SeasonGrouping,
    },
    Predictions {
        horizon: usize,
    },
}

impl ViewRequest {
    pub fn kind(&self) -> ViewKind {
        match self {
            Self::AllData { .. } => ViewKind::AllData,
            Self::BySeason { .. } => ViewKind::BySeason,
            Self::Predictions { .. } => ViewKind::Predictions,
        }
    }
}

/// Resampled chart data for the selected meters.
#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub frequency: Frequency,
    pub meters: MeterSelection,
    pub label: &'static str,
    pub table: Table,
}

/// Output of one view request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", content = "result", rename_all = "snake_case")]
pub enum View {
    AllData(Outcome<ChartData>),
    BySeason(Outcome<SeasonalSummary>),
    Predictions(Outcome<ForecastRun>),
}

impl View {
    pub fn kind(&self) -> ViewKind {
        match self {
            Self::AllData(_) => ViewKind::AllData,
            Self::BySeason(_) => ViewKind::BySeason,
            Self::Predictions(_) => ViewKind::Predictions,
        }
    }

    pub fn warnings(&self) -> &[DataWarning] {
        match self {
            Self::AllData(o) => &o.warnings,
            Self::BySeason(o) => &o.warnings,
            Self::Predictions(o) => &o.warnings,
        }
    }
}

/// Holds the original cleaned table and serves views from it.
#[derive(Debug, Clone)]
pub struct Engine {
    original: Arc<Table>,
    ingest_warnings: Vec<DataWarning>,
    config: Config,
}

impl Engine {
    pub fn new(original: Table, config: Config) -> Self {
        Self {
            original: Arc::new(original),
            ingest_warnings: Vec::new(),
            config,
        }
    }

    /// Read and clean a delimited source.
    pub fn from_reader<R: Read>(reader: R, config: Config) -> Result<Self, EngineError> {
        let raw = read_raw(reader, config.ingest.delimiter_byte())?;
        Self::from_raw(raw, config)
    }

    pub fn from_path(path: impl AsRef<Path>, config: Config) -> Result<Self, EngineError> {
        let raw = read_raw_path(path, config.ingest.delimiter_byte())?;
        Self::from_raw(raw, config)
    }

    fn from_raw(raw: RawRows, config: Config) -> Result<Self, EngineError> {
        let outcome = clean_with(&raw, &config.ingest.clean_options())?;
        info!(
            rows = outcome.value.len(),
            warnings = outcome.warnings.len(),
            "original table ready"
        );
        Ok(Self {
            original: Arc::new(outcome.value),
            ingest_warnings: outcome.warnings,
            config,
        })
    }

    pub fn original(&self) -> &Table {
        &self.original
    }

    /// Warnings raised while cleaning the source.
    pub fn ingest_warnings(&self) -> &[DataWarning] {
        &self.ingest_warnings
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Request for `kind` with parameters taken from the configuration.
    pub fn default_request(&self, kind: ViewKind) -> ViewRequest {
        match kind {
            ViewKind::AllData => ViewRequest::AllData {
                frequency: self.config.resample.frequency,
                meters: self.config.resample.meters,
            },
            ViewKind::BySeason => ViewRequest::BySeason {
                grouping: self.config.seasons.grouping,
            },
            ViewKind::Predictions => ViewRequest::Predictions {
                horizon: self.config.forecast.horizon,
            },
        }
    }

    pub fn render(&self, request: &ViewRequest) -> Result<View, EngineError> {
        let view = match *request {
            ViewRequest::AllData { frequency, meters } => {
                View::AllData(self.all_data(frequency, meters)?)
            }
            ViewRequest::BySeason { grouping } => View::BySeason(self.by_season(grouping)),
            ViewRequest::Predictions { horizon } => View::Predictions(self.predictions(horizon)?),
        };
        for warning in view.warnings() {
            warn!(view = %view.kind(), %warning, "data warning");
        }
        Ok(view)
    }

    /// "All data": the original resampled to `frequency`, projected onto the
    /// selected meters.
    pub fn all_data(
        &self,
        frequency: Frequency,
        meters: MeterSelection,
    ) -> Result<Outcome<ChartData>, EngineError> {
        let resampled = resample(&self.original, frequency)?;
        Ok(resampled.map(|table| ChartData {
            frequency,
            meters,
            label: meters.label(),
            table: table.select(meters.channels()),
        }))
    }

    /// "By season": metering sums per season or per year and season.
    pub fn by_season(&self, grouping: SeasonGrouping) -> Outcome<SeasonalSummary> {
        aggregate(&self.original, grouping)
    }

    /// "Run predictions": monthly total consumption forecast.
    pub fn predictions(&self, horizon: usize) -> Result<Outcome<ForecastRun>, EngineError> {
        let forecast = &self.config.forecast;
        let series = monthly_total_series(&self.original)?;
        let forecaster = Forecaster::sarima(forecast.bounds.clone())
            .with_criterion(forecast.criterion)
            .with_confidence(forecast.confidence);

        let Outcome { value, warnings } = series;
        let run = forecaster.forecast(&value, horizon, forecast.seasonal_period)?;
        Ok(Outcome::with_warnings(run, warnings))
    }
}
