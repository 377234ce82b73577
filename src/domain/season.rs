//! Calendar seasons with fixed month/day boundaries.
//!
//! Winter runs from 21 December to 20 March and therefore straddles the
//! year boundary. Classification first concretizes every season into a
//! [`SeasonInterval`] in the right year for the queried date and then picks
//! the one interval that contains it.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Season {
    Spring = 1,
    Summer = 2,
    Fall = 3,
    Winter = 4,
}

/// A (month, day) pair without a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    const fn new(month: u32, day: u32) -> Self {
        Self { month, day }
    }

    fn in_year(self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

/// Inclusive date range of one season in one concrete year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeasonInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SeasonInterval {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days covered, zero when `end` precedes `start`.
    pub fn days(&self) -> i64 {
        ((self.end - self.start).num_days() + 1).max(0)
    }
}

impl Season {
    /// Canonical order: spring, summer, fall, winter.
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Fall, Season::Winter];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Inclusive (start, end) boundaries.
    pub fn bounds(self) -> (MonthDay, MonthDay) {
        match self {
            Season::Spring => (MonthDay::new(3, 21), MonthDay::new(6, 20)),
            Season::Summer => (MonthDay::new(6, 21), MonthDay::new(9, 22)),
            Season::Fall => (MonthDay::new(9, 23), MonthDay::new(12, 20)),
            Season::Winter => (MonthDay::new(12, 21), MonthDay::new(3, 20)),
        }
    }

    pub fn crosses_year(self) -> bool {
        let (start, end) = self.bounds();
        (end.month, end.day) < (start.month, start.day)
    }

    /// The season that starts in `reference_year`. For winter the end falls
    /// in the following year.
    pub fn interval(self, reference_year: i32) -> Option<SeasonInterval> {
        let (start, end) = self.bounds();
        let end_year = if self.crosses_year() {
            reference_year.checked_add(1)?
        } else {
            reference_year
        };
        Some(SeasonInterval {
            start: start.in_year(reference_year)?,
            end: end.in_year(end_year)?,
        })
    }
}

/// Concretize `season` against the year of `date`.
///
/// Every season uses the date's own year, except winter: from January to
/// March its start moves back to the previous December, and in December its
/// end moves forward to the next March. In every other month winter's
/// interval comes out inverted (start after end) and contains nothing.
/// `None` only at the edges of chrono's representable range.
pub fn season_interval_for(season: Season, date: NaiveDate) -> Option<SeasonInterval> {
    let year = date.year();
    let (start, end) = season.bounds();
    let (start_year, end_year) = if season.crosses_year() {
        match date.month() {
            1..=3 => (year.checked_sub(1)?, year),
            12 => (year, year.checked_add(1)?),
            _ => (year, year),
        }
    } else {
        (year, year)
    };
    Some(SeasonInterval {
        start: start.in_year(start_year)?,
        end: end.in_year(end_year)?,
    })
}

/// Season containing `date`.
pub fn season_of(date: NaiveDate) -> Season {
    Season::ALL
        .into_iter()
        .find(|season| season_interval_for(*season, date).is_some_and(|iv| iv.contains(date)))
        // Only winter dates at the limits of chrono's range lack an interval.
        .unwrap_or(Season::Winter)
}

/// Grouping key combining a season with the raw calendar year of the date.
///
/// Ordered by year, then season ordinal. Rendered as `"winter 2007"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearSeason {
    pub year: i32,
    pub season: Season,
}

pub fn year_season_of(date: NaiveDate) -> YearSeason {
    YearSeason {
        year: date.year(),
        season: season_of(date),
    }
}

impl fmt::Display for YearSeason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.season, self.year)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid season key '{0}', expected '<season> <year>'")]
pub struct ParseYearSeasonError(pub String);

impl FromStr for YearSeason {
    type Err = ParseYearSeasonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseYearSeasonError(s.to_string());
        let (season, year) = s.trim().split_once(' ').ok_or_else(err)?;
        Ok(YearSeason {
            season: Season::from_str(season).map_err(|_| err())?,
            year: year.trim().parse().map_err(|_| err())?,
        })
    }
}

impl Serialize for YearSeason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearSeason {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
