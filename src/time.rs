//! Temporal resolution
//!
//! Turns "last year", "Q2 2023" or a bare year in a question into a closed
//! date interval usable as a range bound on `sale_date`.

use chrono::{Datelike, Local, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref QUARTER_RE: Regex = Regex::new(r"\bq([1-4])\b").unwrap();
    static ref YEAR_RE: Regex = Regex::new(r"\b((?:19|20)\d{2})\b").unwrap();
}

/// Inclusive date interval. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }

    fn calendar_year(year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }

    fn quarter(year: i32, quarter: u32) -> Option<Self> {
        let start_month = 3 * quarter - 2;
        let end_month = 3 * quarter;
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, start_month, 1)?,
            end: month_end(year, end_month, 31)?,
        })
    }
}

/// `day` in the given month, pulled back to the month's last day when the
/// month is shorter.
fn month_end(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    (28..=day)
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
}

/// Source of "today" for temporal resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// Local calendar date, read on every request.
    System,
    Fixed(NaiveDate),
}

impl Clock {
    pub fn resolver(&self) -> TimeResolver {
        match self {
            Clock::System => TimeResolver::system(),
            Clock::Fixed(date) => TimeResolver::new(*date),
        }
    }
}

/// Resolves temporal cues against an injectable "today".
#[derive(Debug, Clone, Copy)]
pub struct TimeResolver {
    today: NaiveDate,
}

impl TimeResolver {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Resolver anchored at the local calendar date.
    pub fn system() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Resolve the temporal cue in an already lower-cased question.
    ///
    /// Priority: "last year", then quarter plus year, then a bare year.
    /// Only the first recognised cue counts.
    pub fn resolve(&self, question: &str) -> Option<DateRange> {
        if question.contains("last year") {
            return DateRange::calendar_year(self.today.year() - 1);
        }

        let year = YEAR_RE
            .captures(question)
            .and_then(|c| c[1].parse::<i32>().ok());

        if let (Some(caps), Some(year)) = (QUARTER_RE.captures(question), year) {
            let quarter: u32 = caps[1].parse().ok()?;
            return DateRange::quarter(year, quarter);
        }

        year.and_then(DateRange::calendar_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> TimeResolver {
        TimeResolver::new(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap())
    }

    fn bounds(range: Option<DateRange>) -> Option<(String, String)> {
        range.map(|r| (r.start_str(), r.end_str()))
    }

    #[test]
    fn test_last_year_uses_injected_today() {
        assert_eq!(
            bounds(resolver().resolve("total sales last year")),
            Some(("2024-01-01".to_string(), "2024-12-31".to_string()))
        );
    }

    #[test]
    fn test_last_year_wins_over_explicit_year() {
        assert_eq!(
            bounds(resolver().resolve("sales last year vs 2019")),
            Some(("2024-01-01".to_string(), "2024-12-31".to_string()))
        );
    }

    #[test]
    fn test_quarter_with_year() {
        assert_eq!(
            bounds(resolver().resolve("sales in q1 2023")),
            Some(("2023-01-01".to_string(), "2023-03-31".to_string()))
        );
        assert_eq!(
            bounds(resolver().resolve("sales in q4 2023")),
            Some(("2023-10-01".to_string(), "2023-12-31".to_string()))
        );
    }

    #[test]
    fn test_quarter_end_is_clamped_to_calendar() {
        // Day 31 does not exist in June or September.
        assert_eq!(
            bounds(resolver().resolve("revenue in q2 2023")),
            Some(("2023-04-01".to_string(), "2023-06-30".to_string()))
        );
        assert_eq!(
            bounds(resolver().resolve("2021 q3 sales")),
            Some(("2021-07-01".to_string(), "2021-09-30".to_string()))
        );
    }

    #[test]
    fn test_quarter_without_year_is_ignored() {
        assert_eq!(resolver().resolve("sales in q2"), None);
    }

    #[test]
    fn test_bare_year() {
        assert_eq!(
            bounds(resolver().resolve("how many sales in 2022?")),
            Some(("2022-01-01".to_string(), "2022-12-31".to_string()))
        );
        assert_eq!(
            bounds(resolver().resolve("orders from 1998")),
            Some(("1998-01-01".to_string(), "1998-12-31".to_string()))
        );
    }

    #[test]
    fn test_non_year_numbers_are_ignored() {
        assert_eq!(resolver().resolve("products above 5000"), None);
        assert_eq!(resolver().resolve("sales in 21000"), None);
        assert_eq!(resolver().resolve("what is the weather today"), None);
    }

    #[test]
    fn test_fixed_clock() {
        let today = NaiveDate::from_ymd_opt(2030, 1, 2).unwrap();
        assert_eq!(Clock::Fixed(today).resolver().today(), today);
    }

    #[test]
    fn test_month_end_clamps_february() {
        assert_eq!(
            month_end(2024, 2, 31),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            month_end(2023, 2, 31),
            NaiveDate::from_ymd_opt(2023, 2, 28)
        );
    }
}
