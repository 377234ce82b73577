use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use super::Channel;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("column '{channel}' has {found} values but the index has {expected}")]
pub struct ShapeError {
    pub channel: Channel,
    pub found: usize,
    pub expected: usize,
}

/// Column-oriented, timestamp-indexed table of meter channels.
///
/// Tables are values: every transform builds a new one and leaves its input
/// untouched. Columns are kept in canonical [`Channel`] order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    index: Vec<NaiveDateTime>,
    columns: BTreeMap<Channel, Vec<f64>>,
}

impl Table {
    /// Create a table with the given index and no columns yet.
    pub fn new(index: Vec<NaiveDateTime>) -> Self {
        Self {
            index,
            columns: BTreeMap::new(),
        }
    }

    /// Add (or replace) a column. Its length must match the index.
    pub fn with_column(mut self, channel: Channel, values: Vec<f64>) -> Result<Self, ShapeError> {
        if values.len() != self.index.len() {
            return Err(ShapeError {
                channel,
                found: values.len(),
                expected: self.index.len(),
            });
        }
        self.columns.insert(channel, values);
        Ok(self)
    }

    /// Assemble from columns already known to match the index length.
    pub(crate) fn from_parts(index: Vec<NaiveDateTime>, columns: BTreeMap<Channel, Vec<f64>>) -> Self {
        debug_assert!(columns.values().all(|v| v.len() == index.len()));
        Self { index, columns }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.index.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.index.last().copied()
    }

    pub fn column(&self, channel: Channel) -> Option<&[f64]> {
        self.columns.get(&channel).map(Vec::as_slice)
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.columns.keys().copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = (Channel, &[f64])> + '_ {
        self.columns.iter().map(|(c, v)| (*c, v.as_slice()))
    }

    pub fn value(&self, row: usize, channel: Channel) -> Option<f64> {
        self.columns.get(&channel).and_then(|v| v.get(row)).copied()
    }

    /// Keep only the listed channels (those present in the table).
    pub fn select(&self, channels: &[Channel]) -> Table {
        let columns = self
            .columns
            .iter()
            .filter(|(c, _)| channels.contains(c))
            .map(|(c, v)| (*c, v.clone()))
            .collect();
        Table {
            index: self.index.clone(),
            columns,
        }
    }

    /// Per-row sum over the listed channels; absent channels count as zero.
    pub fn row_sums(&self, channels: &[Channel]) -> Vec<f64> {
        let mut sums = vec![0.0; self.len()];
        for channel in channels {
            if let Some(values) = self.columns.get(channel) {
                for (acc, v) in sums.iter_mut().zip(values) {
                    *acc += v;
                }
            }
        }
        sums
    }

    /// Column total, or `None` when the channel is absent.
    pub fn column_sum(&self, channel: Channel) -> Option<f64> {
        self.column(channel).map(|v| v.iter().sum())
    }
}
