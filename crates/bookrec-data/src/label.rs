//! Rating ranges: classification bins and the regression rating window.

use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive integer rating interval, written `low-high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRange {
    pub low: u8,
    pub high: u8,
}

impl RatingRange {
    pub fn contains(&self, rating: f32) -> bool {
        rating >= self.low as f32 && rating <= self.high as f32
    }

    pub fn midpoint(&self) -> f32 {
        (self.low as f32 + self.high as f32) / 2.0
    }
}

impl FromStr for RatingRange {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DataError::InvalidRanges(format!("'{s}' is not of the form low-high"));
        let (low, high) = s.trim().split_once('-').ok_or_else(invalid)?;
        let low: u8 = low.trim().parse().map_err(|_| invalid())?;
        let high: u8 = high.trim().parse().map_err(|_| invalid())?;
        if low > high {
            return Err(DataError::InvalidRanges(format!("'{s}' has low > high")));
        }
        Ok(Self { low, high })
    }
}

impl fmt::Display for RatingRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

/// Ordered, non-overlapping ranges mapping ratings to class indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RatingRanges(Vec<RatingRange>);

impl RatingRanges {
    pub fn new(ranges: Vec<RatingRange>) -> Result<Self> {
        if ranges.is_empty() {
            return Err(DataError::InvalidRanges("no ranges given".to_string()));
        }
        for pair in ranges.windows(2) {
            if pair[1].low <= pair[0].high {
                return Err(DataError::InvalidRanges(format!(
                    "{} overlaps or precedes {}",
                    pair[1], pair[0]
                )));
            }
        }
        Ok(Self(ranges))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ranges(&self) -> &[RatingRange] {
        &self.0
    }

    /// Zero-based class of `rating`.
    pub fn class_of(&self, rating: f32) -> Result<usize> {
        self.0
            .iter()
            .position(|r| r.contains(rating))
            .ok_or(DataError::LabelOutOfRange { rating })
    }

    pub fn classes_of(&self, ratings: &[f32]) -> Result<Vec<usize>> {
        ratings.iter().map(|&r| self.class_of(r)).collect()
    }

    /// Representative rating of `class`: the midpoint of its range.
    pub fn midpoint(&self, class: usize) -> Option<f32> {
        self.0.get(class).map(RatingRange::midpoint)
    }
}

impl Default for RatingRanges {
    fn default() -> Self {
        Self(vec![
            RatingRange { low: 1, high: 4 },
            RatingRange { low: 5, high: 7 },
            RatingRange { low: 8, high: 10 },
        ])
    }
}

impl FromStr for RatingRanges {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        let ranges = s
            .split(',')
            .filter(|p| !p.trim().is_empty())
            .map(str::parse::<RatingRange>)
            .collect::<Result<Vec<RatingRange>>>()?;
        Self::new(ranges)
    }
}

impl TryFrom<String> for RatingRanges {
    type Error = DataError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<RatingRanges> for String {
    fn from(r: RatingRanges) -> String {
        r.to_string()
    }
}

impl fmt::Display for RatingRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}
