//! Check-in/check-out handling
//!
//! Dates are given as ISO dates with an optional fuzz modifier, e.g. `2026-12-01+5-3`
//! (five days later to three days earlier) or `2026-12-29+-2` (two days either way).

use crate::ConfigError;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How far a date may drift: `plus` days later, `minus` days earlier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FuzzRange {
    pub plus: u32,
    pub minus: u32,
}

impl FromStr for FuzzRange {
    type Err = ConfigError;

    /// Parses `+N-M`, `+N` or `+-N`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidDateRange(format!("Invalid fuzz modifier: '{}'", s));

        let spec = s.strip_prefix('+').ok_or_else(invalid)?;

        // "+-N" means plus or minus N days
        if let Some(both) = spec.strip_prefix('-') {
            let days = both.parse::<u32>().map_err(|_| invalid())?;
            return Ok(Self {
                plus: days,
                minus: days,
            });
        }

        match spec.split_once('-') {
            Some((plus, minus)) => Ok(Self {
                plus: plus.parse().map_err(|_| invalid())?,
                minus: minus.parse().map_err(|_| invalid())?,
            }),
            None => Ok(Self {
                plus: spec.parse().map_err(|_| invalid())?,
                minus: 0,
            }),
        }
    }
}

impl fmt::Display for FuzzRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.plus == self.minus {
            write!(f, "+-{}", self.plus)
        } else {
            write!(f, "+{}-{}", self.plus, self.minus)
        }
    }
}

/// A date with an optional fuzz modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpec {
    pub date: NaiveDate,
    pub fuzz: Option<FuzzRange>,
}

impl FromStr for DateSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (date_part, fuzz) = match s.find('+') {
            Some(pos) => (&s[..pos], Some(s[pos..].parse::<FuzzRange>()?)),
            None => (s, None),
        };

        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| {
            ConfigError::InvalidDateRange(format!("Invalid date '{}': {}", date_part, e))
        })?;

        Ok(Self { date, fuzz })
    }
}

impl DateSpec {
    /// All dates this spec may resolve to, earliest first
    pub fn candidates(&self) -> Vec<NaiveDate> {
        let fuzz = self.fuzz.unwrap_or_default();
        let earliest = self.date - Duration::days(i64::from(fuzz.minus));
        let span = fuzz.minus + fuzz.plus;
        (0..=span)
            .map(|offset| earliest + Duration::days(i64::from(offset)))
            .collect()
    }
}

/// A concrete check-in/check-out pair attached to a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StayDates {
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
}

/// The user-supplied date range, possibly fuzzy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub checkin: DateSpec,
    pub checkout: DateSpec,
}

impl DateRange {
    /// Parses check-in and check-out strings
    pub fn parse(checkin: &str, checkout: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            checkin: checkin.parse()?,
            checkout: checkout.parse()?,
        })
    }

    /// Rejects check-ins in the past and check-outs before tomorrow
    pub fn validate(&self, today: NaiveDate) -> Result<(), ConfigError> {
        if self.checkin.date < today {
            return Err(ConfigError::InvalidDateRange(format!(
                "Checkin cannot be in past: {}",
                self.checkin.date
            )));
        }

        let tomorrow = today + Duration::days(1);
        if self.checkout.date < tomorrow {
            return Err(ConfigError::InvalidDateRange(format!(
                "Checkout must be tomorrow or later: {}",
                self.checkout.date
            )));
        }

        if self.checkout.date <= self.checkin.date {
            return Err(ConfigError::InvalidDateRange(format!(
                "Checkout {} must be after checkin {}",
                self.checkout.date, self.checkin.date
            )));
        }

        Ok(())
    }

    /// Expands fuzz modifiers into every usable check-in/check-out pair
    ///
    /// Pairs whose check-in falls before `today` or whose check-out is not after the
    /// check-in are skipped.
    pub fn expand(&self, today: NaiveDate) -> Vec<StayDates> {
        let mut pairs = Vec::new();
        for checkin in self.checkin.candidates() {
            if checkin < today {
                continue;
            }
            for checkout in self.checkout.candidates() {
                if checkout > checkin {
                    pairs.push(StayDates { checkin, checkout });
                }
            }
        }
        pairs
    }
}
