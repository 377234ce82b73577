use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::Display;

use crate::error::ResampleError;

/// Calendar unit of a resampling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FrequencyUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl FrequencyUnit {
    fn alias(self) -> &'static str {
        match self {
            Self::Minute => "T",
            Self::Hour => "H",
            Self::Day => "D",
            Self::Week => "W",
            Self::Month => "M",
        }
    }

    fn fixed_duration(self) -> Option<Duration> {
        match self {
            Self::Minute => Some(Duration::minutes(1)),
            Self::Hour => Some(Duration::hours(1)),
            Self::Day => Some(Duration::days(1)),
            Self::Week => Some(Duration::weeks(1)),
            Self::Month => None,
        }
    }
}

/// A window size: `multiplier` consecutive `unit`s.
///
/// Parsed from pandas-style aliases (`H`, `D`, `W`, `M`, `15min`, `3D`) and
/// rendered back the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frequency {
    unit: FrequencyUnit,
    multiplier: u32,
}

impl Frequency {
    pub const HOURLY: Frequency = Frequency::unit(FrequencyUnit::Hour);
    pub const DAILY: Frequency = Frequency::unit(FrequencyUnit::Day);
    pub const WEEKLY: Frequency = Frequency::unit(FrequencyUnit::Week);
    pub const MONTHLY: Frequency = Frequency::unit(FrequencyUnit::Month);

    const fn unit(unit: FrequencyUnit) -> Self {
        Self {
            unit,
            multiplier: 1,
        }
    }

    pub fn new(unit: FrequencyUnit, multiplier: u32) -> Result<Self, ResampleError> {
        if multiplier == 0 {
            return Err(ResampleError::ZeroMultiplier);
        }
        Ok(Self { unit, multiplier })
    }

    pub fn frequency_unit(&self) -> FrequencyUnit {
        self.unit
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Anchor from which windows are counted for a series starting at `first`.
    ///
    /// Minute, hour and day windows count from midnight of the first day,
    /// weeks from the preceding Monday, months from the first day of the
    /// first month.
    pub fn origin(&self, first: NaiveDateTime) -> NaiveDateTime {
        let date = first.date();
        let day = match self.unit {
            FrequencyUnit::Minute | FrequencyUnit::Hour | FrequencyUnit::Day => date,
            FrequencyUnit::Week => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            FrequencyUnit::Month => date.with_day(1).unwrap_or(date),
        };
        day.and_time(NaiveTime::MIN)
    }

    /// Index of the window containing `ts`, counted from `origin`.
    pub fn bucket(&self, origin: NaiveDateTime, ts: NaiveDateTime) -> i64 {
        let mult = self.multiplier as i64;
        match self.unit.fixed_duration() {
            Some(step) => {
                let width = step.num_seconds() * mult;
                (ts - origin).num_seconds().div_euclid(width)
            }
            None => {
                let months = month_index(ts.date()) - month_index(origin.date());
                months.div_euclid(mult)
            }
        }
    }

    /// Start of window number `bucket` counted from `origin`.
    pub fn bucket_start(
        &self,
        origin: NaiveDateTime,
        bucket: i64,
    ) -> Result<NaiveDateTime, ResampleError> {
        let steps = bucket
            .checked_mul(self.multiplier as i64)
            .ok_or(ResampleError::Overflow(origin))?;
        shift(origin, self.unit, steps)
    }

    /// `ts` moved forward by `steps` windows.
    pub fn advance(&self, ts: NaiveDateTime, steps: u32) -> Result<NaiveDateTime, ResampleError> {
        shift(ts, self.unit, steps as i64 * self.multiplier as i64)
    }
}

fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

fn shift(ts: NaiveDateTime, unit: FrequencyUnit, units: i64) -> Result<NaiveDateTime, ResampleError> {
    let overflow = || ResampleError::Overflow(ts);
    match unit.fixed_duration() {
        Some(step) => {
            let delta = Duration::try_seconds(step.num_seconds().checked_mul(units).ok_or_else(overflow)?)
                .ok_or_else(overflow)?;
            ts.checked_add_signed(delta).ok_or_else(overflow)
        }
        None => {
            let months = Months::new(u32::try_from(units.unsigned_abs()).map_err(|_| overflow())?);
            if units >= 0 {
                ts.checked_add_months(months)
            } else {
                ts.checked_sub_months(months)
            }
            .ok_or_else(overflow)
        }
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self::HOURLY
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.multiplier == 1 {
            write!(f, "{}", self.unit.alias())
        } else {
            write!(f, "{}{}", self.multiplier, self.unit.alias())
        }
    }
}

impl FromStr for Frequency {
    type Err = ResampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, alias) = s.split_at(split);
        let multiplier = if digits.is_empty() {
            1
        } else {
            digits
                .parse()
                .map_err(|_| ResampleError::InvalidFrequency(s.to_string()))?
        };
        let unit = match alias.to_ascii_uppercase().as_str() {
            "T" | "MIN" | "MINUTE" | "MINUTES" => FrequencyUnit::Minute,
            "H" | "HOUR" | "HOURS" | "HOURLY" => FrequencyUnit::Hour,
            "D" | "DAY" | "DAYS" | "DAILY" => FrequencyUnit::Day,
            "W" | "WEEK" | "WEEKS" | "WEEKLY" => FrequencyUnit::Week,
            "M" | "MS" | "MONTH" | "MONTHS" | "MONTHLY" => FrequencyUnit::Month,
            _ => return Err(ResampleError::InvalidFrequency(s.to_string())),
        };
        Frequency::new(unit, multiplier)
    }
}

impl Serialize for Frequency {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Frequency {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
