//! Seasonal aggregation of the metering channels.
//!
//! Rows are grouped either by [`Season`] alone or by [`YearSeason`] and the
//! four metering channels are summed per group. Every other channel is
//! dropped. Groups come back in canonical order: seasons by ordinal, year
//! seasons by year and then ordinal.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use strum::{Display as StrumDisplay, EnumString};
use tracing::{info, warn};

use crate::domain::{season_of, year_season_of, Channel, Season, Table, YearSeason};
use crate::error::{DataWarning, Outcome};

/// How rows are grouped into seasons.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, StrumDisplay, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SeasonGrouping {
    /// All years folded together: at most four groups.
    #[default]
    Season,
    /// One group per calendar year and season.
    YearSeason,
}

/// Summed metering channels of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalRow<K> {
    pub key: K,
    pub sums: BTreeMap<Channel, f64>,
    /// Number of source rows in the group
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalTable<K> {
    pub rows: Vec<SeasonalRow<K>>,
}

impl<K: PartialEq + Copy> SeasonalTable<K> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keys(&self) -> Vec<K> {
        self.rows.iter().map(|r| r.key).collect()
    }

    pub fn get(&self, key: K) -> Option<&SeasonalRow<K>> {
        self.rows.iter().find(|r| r.key == key)
    }

    pub fn sum(&self, key: K, channel: Channel) -> Option<f64> {
        self.get(key).and_then(|r| r.sums.get(&channel)).copied()
    }

    /// Sum of `channel` over every group.
    pub fn total(&self, channel: Channel) -> f64 {
        self.rows
            .iter()
            .filter_map(|r| r.sums.get(&channel))
            .sum()
    }
}

/// Either grouping's result, for callers that pick the grouping at runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SeasonalSummary {
    BySeason(SeasonalTable<Season>),
    ByYearSeason(SeasonalTable<YearSeason>),
}

impl SeasonalSummary {
    pub fn len(&self) -> usize {
        match self {
            Self::BySeason(t) => t.len(),
            Self::ByYearSeason(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn aggregate(table: &Table, grouping: SeasonGrouping) -> Outcome<SeasonalSummary> {
    match grouping {
        SeasonGrouping::Season => aggregate_by_season(table).map(SeasonalSummary::BySeason),
        SeasonGrouping::YearSeason => {
            aggregate_by_year_season(table).map(SeasonalSummary::ByYearSeason)
        }
    }
}

/// Sum the metering channels per season, all years together.
pub fn aggregate_by_season(table: &Table) -> Outcome<SeasonalTable<Season>> {
    let result = group_sums(table, |ts| season_of(ts.date()));
    let missing: Vec<Season> = Season::ALL
        .into_iter()
        .filter(|s| result.get(*s).is_none())
        .collect();
    finish(result, missing, "season")
}

/// Sum the metering channels per (calendar year, season).
pub fn aggregate_by_year_season(table: &Table) -> Outcome<SeasonalTable<YearSeason>> {
    let result = group_sums(table, |ts| year_season_of(ts.date()));
    let missing = match (result.rows.first(), result.rows.last()) {
        (Some(first), Some(last)) => (first.key.year..=last.key.year)
            .cartesian_product(Season::ALL)
            .map(|(year, season)| YearSeason { year, season })
            .filter(|k| *k > first.key && *k < last.key && result.get(*k).is_none())
            .collect(),
        _ => Vec::new(),
    };
    finish(result, missing, "year_season")
}

fn group_sums<K: Ord + Copy>(
    table: &Table,
    key_of: impl Fn(chrono::NaiveDateTime) -> K,
) -> SeasonalTable<K> {
    let meters: Vec<(Channel, &[f64])> = table
        .columns()
        .filter(|(c, _)| Channel::METERS.contains(c))
        .collect();

    let mut groups: BTreeMap<K, SeasonalRow<K>> = BTreeMap::new();
    for (row, ts) in table.index().iter().enumerate() {
        let key = key_of(*ts);
        let group = groups.entry(key).or_insert_with(|| SeasonalRow {
            key,
            sums: meters.iter().map(|(c, _)| (*c, 0.0)).collect(),
            count: 0,
        });
        group.count += 1;
        for (channel, values) in &meters {
            if let Some(sum) = group.sums.get_mut(channel) {
                *sum += values[row];
            }
        }
    }

    SeasonalTable {
        rows: groups.into_values().collect(),
    }
}

fn finish<K: Display + Copy + PartialEq>(
    result: SeasonalTable<K>,
    missing: Vec<K>,
    grouping: &str,
) -> Outcome<SeasonalTable<K>> {
    let mut warnings = Vec::new();
    if !missing.is_empty() {
        let warning = DataWarning::EmptyWindow {
            bucket: missing.iter().join(", "),
            count: missing.len(),
        };
        warn!(%warning, grouping, "seasons without readings");
        warnings.push(warning);
    }
    info!(groups = result.len(), grouping, "aggregated by season");
    Outcome::with_warnings(result, warnings)
}
