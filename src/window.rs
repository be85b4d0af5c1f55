//! Lookback windows for historical queries
//!
//! Windows are written as `<positive integer><unit>` where unit is `d`, `h`
//! or `m` (e.g. `30d`, `24h`, `15m`) and are rendered as Postgres interval
//! text (`30 days`) when bound into a query.

use crate::error::ExporterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Unit of a lookback window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Day,
    Hour,
    Minute,
}

impl TimeUnit {
    fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_lowercase() {
            'd' => Some(Self::Day),
            'h' => Some(Self::Hour),
            'm' => Some(Self::Minute),
            _ => None,
        }
    }

    /// Short suffix used in configuration text
    pub fn code(&self) -> char {
        match self {
            Self::Day => 'd',
            Self::Hour => 'h',
            Self::Minute => 'm',
        }
    }

    /// Plural unit name understood by Postgres interval input
    pub fn interval_name(&self) -> &'static str {
        match self {
            Self::Day => "days",
            Self::Hour => "hours",
            Self::Minute => "minutes",
        }
    }

    fn seconds(&self) -> u64 {
        match self {
            Self::Day => 86_400,
            Self::Hour => 3_600,
            Self::Minute => 60,
        }
    }
}

/// A trailing time interval, immutable once parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    unit: TimeUnit,
    value: u32,
}

impl TimeWindow {
    /// Parse a window such as `30d`.
    ///
    /// Fails with `InvalidWindowFormat` when the trailing character is not a
    /// recognized unit or the leading part is not a positive integer.
    pub fn parse(text: &str) -> Result<Self, ExporterError> {
        let trimmed = text.trim();
        let invalid = |reason: &str| ExporterError::InvalidWindowFormat {
            input: text.to_string(),
            reason: reason.to_string(),
        };

        let mut chars = trimmed.chars();
        let code = chars.next_back().ok_or_else(|| invalid("window is empty"))?;
        let unit = TimeUnit::from_code(code).ok_or_else(|| {
            invalid(&format!(
                "unknown unit '{}', use 'd' for days, 'h' for hours or 'm' for minutes",
                code
            ))
        })?;

        let magnitude = chars.as_str();
        if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("magnitude must be a positive integer"));
        }
        let value: u32 = magnitude
            .parse()
            .map_err(|_| invalid("magnitude is out of range"))?;
        if value == 0 {
            return Err(invalid("magnitude must be greater than zero"));
        }

        Ok(Self { unit, value })
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Interval text bound as the `$1::interval` query parameter
    pub fn to_interval(&self) -> String {
        format!("{} {}", self.value, self.unit.interval_name())
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.value as u64 * self.unit.seconds())
    }
}

impl FromStr for TimeWindow {
    type Err = ExporterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.code())
    }
}

impl Serialize for TimeWindow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeWindow {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
