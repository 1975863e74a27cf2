//! Weekly game clock.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of simulated weeks in one game year.
pub const WEEKS_PER_YEAR: u32 = 52;

/// A (year, week) pair. Weeks run 1..=52.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameWeek {
    pub year: i32,
    pub week: u32,
}

impl GameWeek {
    /// Build a week, folding out-of-range week numbers into the valid band.
    pub fn new(year: i32, week: u32) -> Self {
        Self {
            year,
            week: week.clamp(1, WEEKS_PER_YEAR),
        }
    }

    /// Linear week index, used for ordering and delay arithmetic.
    pub fn index(self) -> i64 {
        i64::from(self.year) * i64::from(WEEKS_PER_YEAR) + i64::from(self.week) - 1
    }

    /// Inverse of [`GameWeek::index`].
    pub fn from_index(index: i64) -> Self {
        let per_year = i64::from(WEEKS_PER_YEAR);
        let year = index.div_euclid(per_year);
        let week = index.rem_euclid(per_year) + 1;
        Self {
            year: year as i32,
            week: week as u32,
        }
    }

    /// The following week, rolling into the next year after week 52.
    pub fn next(self) -> Self {
        if self.week >= WEEKS_PER_YEAR {
            Self {
                year: self.year + 1,
                week: 1,
            }
        } else {
            Self {
                year: self.year,
                week: self.week + 1,
            }
        }
    }

    pub fn plus_weeks(self, weeks: u32) -> Self {
        Self::from_index(self.index() + i64::from(weeks))
    }

    /// Month bucket 0..=11 of the 52-week year.
    pub fn month(self) -> usize {
        (((self.week.max(1) - 1) * 12 / WEEKS_PER_YEAR) as usize).min(11)
    }

    /// Quarter 0..=3.
    pub fn quarter(self) -> usize {
        self.month() / 3
    }
}

impl fmt::Display for GameWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}
