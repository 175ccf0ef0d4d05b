//! crates/insight_core/src/period.rs
//!
//! Maps a symbolic period name to the date range a summary should cover.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, Local, NaiveDate};

use crate::domain::SummaryRequest;
use crate::ports::PortError;

/// The period labels a client may ask a summary for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    /// Length of the range in days.
    pub fn days(self) -> u64 {
        match self {
            Period::Day => 1,
            Period::Week => 7,
            Period::Month => 30,
        }
    }

    /// Builds the descriptor covering `[today - days, today]`.
    pub fn resolve(self, topic_title: &str, today: NaiveDate) -> SummaryRequest {
        let start = today
            .checked_sub_days(Days::new(self.days()))
            .unwrap_or(NaiveDate::MIN);
        SummaryRequest::new(topic_title, start, today)
    }
}

impl FromStr for Period {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            _ => Err(PortError::InvalidPeriod(s.to_string())),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        };
        f.write_str(label)
    }
}

/// Resolves `token` against today's local date.
///
/// Returns `None` for anything other than `day`, `week` or `month`
/// (compared case-insensitively). Dates are computed on every call.
pub fn resolve_period(token: &str, topic_title: &str) -> Option<SummaryRequest> {
    let period = token.parse::<Period>().ok()?;
    Some(period.resolve(topic_title, Local::now().date_naive()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_tokens_case_insensitively() {
        assert_eq!("day".parse::<Period>().unwrap(), Period::Day);
        assert_eq!("WEEK".parse::<Period>().unwrap(), Period::Week);
        assert_eq!("Month".parse::<Period>().unwrap(), Period::Month);
    }

    #[test]
    fn rejects_unknown_tokens() {
        for token in ["yesterday", "", "days", " week"] {
            let err = token.parse::<Period>().unwrap_err();
            assert!(matches!(err, PortError::InvalidPeriod(_)), "token {token:?}");
            assert!(resolve_period(token, "AI").is_none());
        }
    }

    #[test]
    fn week_covers_seven_days_ending_today() {
        let today = date(2024, 3, 5);
        let request = Period::Week.resolve("AI", today);
        assert_eq!(request.topic_title, "AI");
        assert_eq!(request.start_date, date(2024, 2, 27));
        assert_eq!(request.end_date, today);
    }

    #[test]
    fn range_length_matches_period() {
        let today = date(2024, 1, 1);
        for period in [Period::Day, Period::Week, Period::Month] {
            let request = period.resolve("Rust", today);
            assert_eq!(request.end_date, today);
            assert_eq!((request.end_date - request.start_date).num_days() as u64, period.days());
        }
    }

    #[test]
    fn resolve_period_ends_today() {
        let request = resolve_period("day", "AI").unwrap();
        assert_eq!(request.end_date, Local::now().date_naive());
        assert_eq!((request.end_date - request.start_date).num_days(), 1);
    }

    #[test]
    fn iso_formatting_of_dates() {
        let request = Period::Month.resolve("AI", date(2024, 3, 1));
        assert_eq!(request.start_date.to_string(), "2024-01-31");
        assert_eq!(request.end_date.to_string(), "2024-03-01");
    }
}
