//! Calendar-month periods and reporting windows

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// A calendar month, e.g. `2026-03`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::Validation(format!("month out of range: {}", month)));
        }
        Ok(Self { year, month })
    }

    pub fn of<D: Datelike>(date: &D) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Month `n` months before this one
    pub fn minus_months(&self, n: u32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) - n as i32;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::Validation(format!("invalid year-month: {}", s));
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        YearMonth::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Dashboard reporting window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PeriodWindow {
    #[serde(alias = "last6")]
    Last6Months,
    #[default]
    #[serde(alias = "last12")]
    Last12Months,
    #[serde(alias = "ytd")]
    YearToDate,
    All,
}

impl PeriodWindow {
    /// Inclusive month bounds ending at `current`, or `None` for [`PeriodWindow::All`]
    pub fn bounds(&self, current: YearMonth) -> Option<(YearMonth, YearMonth)> {
        match self {
            PeriodWindow::Last6Months => Some((current.minus_months(5), current)),
            PeriodWindow::Last12Months => Some((current.minus_months(11), current)),
            PeriodWindow::YearToDate => Some((
                YearMonth {
                    year: current.year,
                    month: 1,
                },
                current,
            )),
            PeriodWindow::All => None,
        }
    }

    pub fn contains(&self, current: YearMonth, month: YearMonth) -> bool {
        match self.bounds(current) {
            Some((start, end)) => start <= month && month <= end,
            None => month <= current,
        }
    }

    pub fn contains_instant(&self, current: YearMonth, at: &DateTime<Utc>) -> bool {
        self.contains(current, YearMonth::of(at))
    }

    /// Month buckets covered by the window, oldest first.
    ///
    /// For [`PeriodWindow::All`] the buckets start at `earliest` (or the
    /// current month when nothing is recorded yet).
    pub fn buckets(&self, current: YearMonth, earliest: Option<YearMonth>) -> Vec<YearMonth> {
        let start = match self.bounds(current) {
            Some((start, _)) => start,
            None => earliest.filter(|e| *e <= current).unwrap_or(current),
        };
        let mut months = Vec::new();
        let mut month = start;
        while month <= current {
            months.push(month);
            month = month.next();
        }
        months
    }
}
