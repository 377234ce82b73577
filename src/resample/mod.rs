//! Frequency resampling by arithmetic mean over calendar-aligned windows.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::domain::{Channel, Frequency, Table};
use crate::error::{DataWarning, Outcome, ResampleError};

/// Running sums of one window.
#[derive(Debug, Default)]
struct Window {
    sums: BTreeMap<Channel, (f64, usize)>,
}

impl Window {
    fn add(&mut self, table: &Table, row: usize) {
        for (channel, values) in table.columns() {
            let entry = self.sums.entry(channel).or_insert((0.0, 0));
            let v = values[row];
            if !v.is_nan() {
                entry.0 += v;
                entry.1 += 1;
            }
        }
    }

    fn mean(&self, channel: Channel) -> f64 {
        match self.sums.get(&channel) {
            Some(&(sum, n)) if n > 0 => sum / n as f64,
            _ => f64::NAN,
        }
    }
}

/// Aggregate `table` into consecutive windows of `frequency`.
///
/// Each output row is labelled with its window start and holds the mean of
/// every channel over the rows that fell inside it. Windows without rows are
/// left out and reported in a single [`DataWarning::EmptyWindow`].
pub fn resample(table: &Table, frequency: Frequency) -> Result<Outcome<Table>, ResampleError> {
    let Some(first) = table.first_timestamp() else {
        return Ok(Outcome::new(table.clone()));
    };
    let origin = frequency.origin(first);

    let mut windows: BTreeMap<i64, Window> = BTreeMap::new();
    for (row, ts) in table.index().iter().enumerate() {
        windows
            .entry(frequency.bucket(origin, *ts))
            .or_default()
            .add(table, row);
    }

    let mut index = Vec::with_capacity(windows.len());
    for bucket in windows.keys() {
        index.push(frequency.bucket_start(origin, *bucket)?);
    }

    let columns = table
        .channels()
        .map(|channel| {
            let means = windows.values().map(|w| w.mean(channel)).collect();
            (channel, means)
        })
        .collect();

    let mut warnings = Vec::new();
    if let Some(warning) = empty_windows(&windows, frequency, origin)? {
        warn!(%warning, %frequency, "resampling left gaps");
        warnings.push(warning);
    }

    let resampled = Table::from_parts(index, columns);
    info!(
        %frequency,
        rows_in = table.len(),
        rows_out = resampled.len(),
        "resampled table"
    );
    Ok(Outcome::with_warnings(resampled, warnings))
}

/// Count the gaps between occupied windows and label the first one.
fn empty_windows(
    windows: &BTreeMap<i64, Window>,
    frequency: Frequency,
    origin: NaiveDateTime,
) -> Result<Option<DataWarning>, ResampleError> {
    let mut count = 0usize;
    let mut first_gap = None;
    let mut keys = windows.keys().copied();
    let Some(mut previous) = keys.next() else {
        return Ok(None);
    };
    for bucket in keys {
        let gap = bucket - previous - 1;
        if gap > 0 {
            if first_gap.is_none() {
                first_gap = Some(previous + 1);
            }
            count += gap as usize;
        }
        previous = bucket;
    }
    match first_gap {
        Some(bucket) => Ok(Some(DataWarning::EmptyWindow {
            bucket: frequency.bucket_start(origin, bucket)?.to_string(),
            count,
        })),
        None => Ok(None),
    }
}
