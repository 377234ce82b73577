//! Error and warning types shared by every stage of the engine.
//!
//! Fatal conditions are `thiserror` enums returned through `Result`;
//! recoverable data-quality conditions are collected as [`DataWarning`]s and
//! travel next to the produced value inside an [`Outcome`].

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::domain::Channel;

/// Ingestion failures. Always fatal: nothing downstream runs.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Parse error: required column '{0}' is missing")]
    MissingColumn(String),

    #[error("Parse error: cannot parse timestamp '{value}' on line {line}")]
    BadTimestamp { line: usize, value: String },

    #[error("Parse error: row on line {line} has {found} fields, expected {expected}")]
    RaggedRow {
        line: usize,
        found: usize,
        expected: usize,
    },

    #[error("Parse error: input has no header row")]
    EmptyInput,

    #[error("Parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parse error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resampling and aggregation failures, local to the requested view.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResampleError {
    #[error("Invalid frequency '{0}'")]
    InvalidFrequency(String),

    #[error("Frequency multiplier must be positive")]
    ZeroMultiplier,

    #[error("Timestamp arithmetic overflowed while advancing {0}")]
    Overflow(NaiveDateTime),
}

/// Umbrella error for requests served by [`crate::engine::Engine`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Resample(#[from] ResampleError),

    #[error(transparent)]
    Forecast(#[from] crate::forecast::ForecastError),
}

/// Recoverable data-quality conditions surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    /// A channel had no valid value at all, so no mean exists to impute with.
    Imputation { channel: Channel, missing: usize },
    /// Windows or groups that received no rows and were omitted.
    EmptyWindow { bucket: String, count: usize },
    /// Source rows were not in timestamp order and had to be sorted.
    Unordered { rows: usize },
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imputation { channel, missing } => write!(
                f,
                "channel '{}' has no valid values; {} missing values left unimputed",
                channel, missing
            ),
            Self::EmptyWindow { bucket, count } => {
                write!(f, "{} empty window(s) omitted, first at {}", count, bucket)
            }
            Self::Unordered { rows } => write!(f, "{} rows re-ordered by timestamp", rows),
        }
    }
}

/// A produced value plus the warnings raised while producing it.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<DataWarning>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<DataWarning>) -> Self {
        Self { value, warnings }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}
