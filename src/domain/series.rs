use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Frequency;

/// A single numeric series at a regular native step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub frequency: Frequency,
    index: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl Series {
    pub fn from_pairs(
        name: impl Into<String>,
        frequency: Frequency,
        points: impl IntoIterator<Item = (NaiveDateTime, f64)>,
    ) -> Self {
        let (index, values) = points.into_iter().unzip();
        Self {
            name: name.into(),
            frequency,
            index,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.index.last().copied()
    }
}
