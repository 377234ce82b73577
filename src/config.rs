use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

use crate::domain::{Frequency, MeterSelection};
use crate::forecast::{InformationCriterion, SearchBounds, DEFAULT_CONFIDENCE};
use crate::ingest::CleanOptions;
use crate::seasons::SeasonGrouping;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "HEF__";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub ingest: IngestConfig,
    pub resample: ResampleConfig,
    pub seasons: SeasonsConfig,
    #[validate(nested)]
    pub forecast: ForecastConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct IngestConfig {
    /// Field delimiter; detected from the header line when unset
    #[validate(custom(function = "validate_delimiter"))]
    pub delimiter: Option<char>,
    /// Clamp negative `not_sub_metering` residuals to zero
    pub clamp_negative_residual: bool,
}

impl IngestConfig {
    /// Delimiter as the byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> Option<u8> {
        self.delimiter.and_then(|c| u8::try_from(c).ok())
    }

    pub fn clean_options(&self) -> CleanOptions {
        CleanOptions {
            clamp_negative_residual: self.clamp_negative_residual,
        }
    }
}

fn validate_delimiter(delimiter: &char) -> Result<(), validator::ValidationError> {
    if delimiter.is_ascii() && !delimiter.is_ascii_alphanumeric() {
        Ok(())
    } else {
        Err(validator::ValidationError::new("delimiter_not_ascii_punctuation"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    pub frequency: Frequency,
    pub meters: MeterSelection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonsConfig {
    pub grouping: SeasonGrouping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ForecastConfig {
    #[validate(range(min = 1, max = 120))]
    pub horizon: usize,
    /// Seasonal period in native steps of the monthly series
    #[validate(range(max = 24))]
    pub seasonal_period: usize,
    pub criterion: InformationCriterion,
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub confidence: f64,
    #[validate(nested)]
    pub bounds: SearchBounds,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 12,
            seasonal_period: 12,
            criterion: InformationCriterion::default(),
            confidence: DEFAULT_CONFIDENCE,
            bounds: SearchBounds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: true,
        }
    }
}

impl Config {
    /// Defaults, then `config/default.toml`, then `HEF__` environment
    /// variables (`HEF__FORECAST__HORIZON=6`).
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let path = path.as_ref();
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        let config: Config = figment
            .extract()
            .with_context(|| format!("loading configuration from {}", path.display()))?;
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    /// Effective configuration rendered back as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
