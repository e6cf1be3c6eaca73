use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A calendar week, identified by its Monday.
///
/// Any date maps to the week containing it, so two dates in the same
/// Monday-to-Sunday span compare equal once bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Week(NaiveDate);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid week date '{0}': expected YYYY-MM-DD")]
pub struct WeekParseError(pub String);

impl Week {
    /// The week containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let offset = date.weekday().num_days_from_monday() as i64;
        Week(date - Duration::days(offset))
    }

    /// The week containing today's date (UTC).
    pub fn current() -> Self {
        Self::containing(Utc::now().date_naive())
    }

    pub fn monday(&self) -> NaiveDate {
        self.0
    }

    pub fn next(&self) -> Self {
        Week(self.0 + Duration::days(7))
    }

    pub fn previous(&self) -> Self {
        Week(self.0 - Duration::days(7))
    }

    /// Parses an ISO date and reports whether it had to be moved to its Monday.
    pub fn parse_normalizing(s: &str) -> Result<(Self, bool), WeekParseError> {
        let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|_| WeekParseError(s.to_string()))?;
        let week = Self::containing(date);
        Ok((week, week.0 != date))
    }
}

impl FromStr for Week {
    type Err = WeekParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_normalizing(s).map(|(week, _)| week)
    }
}

impl fmt::Display for Week {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl Serialize for Week {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Week {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
