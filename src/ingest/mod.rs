//! Signal cleaning: raw meter rows in, imputed time-indexed table out.
//!
//! Accepts the household power consumption layout (`Date;Time;...`,
//! semicolon-delimited, `?` for missing) and the pre-parsed layout with a
//! single `Date_Time` column. Malformed numeric cells never abort ingestion;
//! they become missing values and are mean-imputed per column after the
//! derived channels are computed.

pub mod timestamp;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::domain::{Channel, Table};
use crate::error::{DataWarning, IngestError, Outcome};

/// Watt-hours per minute of one kilowatt sustained for that minute.
const KW_TO_WH_PER_MINUTE: f64 = 1000.0 / 60.0;

/// Header row plus unparsed fields, exactly as read from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRows {
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based line number in the source
    pub line: usize,
    pub fields: Vec<String>,
}

impl RawRows {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanOptions {
    /// Replace negative `not_sub_metering` residuals with zero.
    #[serde(default)]
    pub clamp_negative_residual: bool,
}

/// Pick `;` or `,` from the header line, whichever occurs more often.
pub fn detect_delimiter(header_line: &str) -> u8 {
    let semicolons = header_line.matches(';').count();
    let commas = header_line.matches(',').count();
    if semicolons >= commas && semicolons > 0 {
        b';'
    } else {
        b','
    }
}

/// Read delimited rows. `delimiter` is auto-detected when `None`.
pub fn read_raw<R: Read>(mut reader: R, delimiter: Option<u8>) -> Result<RawRows, IngestError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let header_line = text.lines().next().ok_or(IngestError::EmptyInput)?;
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(header_line));

    let mut csv = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = csv.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(IngestError::EmptyInput);
    }

    let mut records = Vec::new();
    for (i, record) in csv.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(i + 2);
        if record.len() > headers.len() {
            return Err(IngestError::RaggedRow {
                line,
                found: record.len(),
                expected: headers.len(),
            });
        }
        records.push(RawRecord {
            line,
            fields: record.iter().map(str::to_string).collect(),
        });
    }

    debug!(rows = records.len(), delimiter = %(delimiter as char), "read raw meter rows");
    Ok(RawRows { headers, records })
}

pub fn read_raw_path(path: impl AsRef<Path>, delimiter: Option<u8>) -> Result<RawRows, IngestError> {
    let file = File::open(path.as_ref())?;
    read_raw(file, delimiter)
}

/// Numeric coercion that never fails: anything unparsable is missing (NaN).
pub fn coerce_numeric(field: &str) -> f64 {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(f64::NAN)
}

/// Source header of a raw channel, e.g. `Global_active_power`.
fn source_header(channel: Channel) -> String {
    let name = channel.name();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

enum TimestampColumns {
    Combined(usize),
    Split { date: usize, time: usize },
}

impl TimestampColumns {
    fn locate(raw: &RawRows) -> Result<Self, IngestError> {
        if let Some(idx) = raw.column_index("Date_Time") {
            return Ok(Self::Combined(idx));
        }
        let date = raw
            .column_index("Date")
            .ok_or_else(|| IngestError::MissingColumn("Date".to_string()))?;
        let time = raw
            .column_index("Time")
            .ok_or_else(|| IngestError::MissingColumn("Time".to_string()))?;
        Ok(Self::Split { date, time })
    }

    fn parse(&self, record: &RawRecord) -> Result<NaiveDateTime, IngestError> {
        let field = |i: usize| record.fields.get(i).map(String::as_str).unwrap_or("");
        let parsed = match *self {
            Self::Combined(i) => timestamp::parse_datetime(field(i)),
            Self::Split { date, time } => timestamp::parse_date_and_time(field(date), field(time)),
        };
        parsed.ok_or_else(|| IngestError::BadTimestamp {
            line: record.line,
            value: match *self {
                Self::Combined(i) => field(i).to_string(),
                Self::Split { date, time } => format!("{} {}", field(date), field(time)),
            },
        })
    }
}

/// [`clean_with`] using default options.
pub fn clean(raw: &RawRows) -> Result<Outcome<Table>, IngestError> {
    clean_with(raw, &CleanOptions::default())
}

/// Parse, derive and impute.
///
/// Fails only when a required column is missing or a timestamp cannot be
/// parsed. The result is sorted by timestamp.
pub fn clean_with(raw: &RawRows, options: &CleanOptions) -> Result<Outcome<Table>, IngestError> {
    let timestamps = TimestampColumns::locate(raw)?;
    let raw_columns = Channel::RAW
        .iter()
        .map(|&channel| {
            raw.column_index(channel.name())
                .map(|idx| (channel, idx))
                .ok_or_else(|| IngestError::MissingColumn(source_header(channel)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut index = Vec::with_capacity(raw.len());
    for record in &raw.records {
        index.push(timestamps.parse(record)?);
    }

    let mut columns: BTreeMap<Channel, Vec<f64>> = raw_columns
        .iter()
        .map(|&(channel, idx)| {
            let values = raw
                .records
                .iter()
                .map(|r| r.fields.get(idx).map_or(f64::NAN, |f| coerce_numeric(f)))
                .collect();
            (channel, values)
        })
        .collect();

    let mut warnings = Vec::new();
    if let Some(order) = sort_permutation(&index) {
        let moved = order.iter().enumerate().filter(|(i, j)| i != *j).count();
        warn!(rows = moved, "meter rows were not in timestamp order; sorting");
        warnings.push(DataWarning::Unordered { rows: moved });
        index = order.iter().map(|&i| index[i]).collect();
        for values in columns.values_mut() {
            *values = order.iter().map(|&i| values[i]).collect();
        }
    }

    derive_channels(&mut columns, options);

    for (channel, values) in columns.iter_mut() {
        if let Some(warning) = impute_mean(*channel, values) {
            warn!(%warning, "imputation skipped");
            warnings.push(warning);
        }
    }

    let table = Table::from_parts(index, columns);

    info!(
        rows = table.len(),
        warnings = warnings.len(),
        "cleaned meter readings"
    );
    Ok(Outcome::with_warnings(table, warnings))
}

/// Stable sort order for `index`, or `None` when it is already ordered.
fn sort_permutation(index: &[NaiveDateTime]) -> Option<Vec<usize>> {
    if index.windows(2).all(|w| w[0] <= w[1]) {
        return None;
    }
    let mut order: Vec<usize> = (0..index.len()).collect();
    order.sort_by_key(|&i| index[i]);
    Some(order)
}

/// Compute the derived channels row by row. Missing inputs give a missing
/// output.
fn derive_channels(columns: &mut BTreeMap<Channel, Vec<f64>>, options: &CleanOptions) {
    let col = |c: Channel| columns.get(&c).cloned().unwrap_or_default();
    let active = col(Channel::GlobalActivePower);
    let reactive = col(Channel::GlobalReactivePower);
    let s1 = col(Channel::SubMetering1);
    let s2 = col(Channel::SubMetering2);
    let s3 = col(Channel::SubMetering3);
    let n = active.len();

    let mut apparent = Vec::with_capacity(n);
    let mut residual = Vec::with_capacity(n);
    let mut metered = Vec::with_capacity(n);
    let mut total = Vec::with_capacity(n);
    for i in 0..n {
        let sub = s1[i] + s2[i] + s3[i];
        let mut rest = active[i] * KW_TO_WH_PER_MINUTE - s1[i] - s2[i] - s3[i];
        if options.clamp_negative_residual && rest < 0.0 {
            rest = 0.0;
        }
        apparent.push(active[i] + reactive[i]);
        residual.push(rest);
        metered.push(sub);
        total.push(sub + rest);
    }

    columns.insert(Channel::GlobalApparentPower, apparent);
    columns.insert(Channel::NotSubMetering, residual);
    columns.insert(Channel::TotalSubMetering, metered);
    columns.insert(Channel::TotalSubNoSubMetering, total);
}

/// Fill NaNs with the mean of the column's valid values.
///
/// Returns a warning, leaving the column untouched, when no valid value
/// exists.
pub fn impute_mean(channel: Channel, values: &mut [f64]) -> Option<DataWarning> {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    let missing = values.len() - count;
    if missing == 0 {
        return None;
    }
    if count == 0 {
        return Some(DataWarning::Imputation { channel, missing });
    }
    let mean = sum / count as f64;
    for v in values.iter_mut().filter(|v| v.is_nan()) {
        *v = mean;
    }
    debug!(%channel, missing, mean, "imputed missing values");
    None
}
