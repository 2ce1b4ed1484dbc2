use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Utc};

/// A calendar month in `YYYY-MM` form, years 0001 through 9999.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (1..=9999).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn current() -> Self {
        let today = Utc::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    /// The month immediately before this one; January rolls back to December.
    /// `None` for January of year 1.
    pub fn previous(&self) -> Option<Self> {
        if self.month == 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePeriodError(String);

impl fmt::Display for ParsePeriodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid period '{}', expected YYYY-MM", self.0)
    }
}

impl std::error::Error for ParsePeriodError {}

impl FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePeriodError(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(err());
        }
        let digits_ok = bytes[..4]
            .iter()
            .chain(&bytes[5..])
            .all(|b| b.is_ascii_digit());
        if !digits_ok {
            return Err(err());
        }
        let year: i32 = s[..4].parse().map_err(|_| err())?;
        let month: u32 = s[5..].parse().map_err(|_| err())?;
        Period::new(year, month).ok_or_else(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strict_year_month() {
        let period: Period = "2025-06".parse().unwrap();
        assert_eq!(period, Period::new(2025, 6).unwrap());
        assert_eq!(period.to_string(), "2025-06");
    }

    #[test]
    fn rejects_loose_formats() {
        for bad in ["2025-1", "2025-13", "2025-00", "25-01", "2025/01", "2025-01-01", "", "abcd-ef", "0000-01"] {
            assert!(bad.parse::<Period>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn previous_rolls_over_year() {
        let january: Period = "2025-01".parse().unwrap();
        assert_eq!(january.previous().unwrap().to_string(), "2024-12");
        let june: Period = "2025-06".parse().unwrap();
        assert_eq!(june.previous().unwrap().to_string(), "2025-05");
    }

    #[test]
    fn earliest_month_has_no_predecessor() {
        assert!("0000-06".parse::<Period>().is_err());
        let first: Period = "0001-01".parse().unwrap();
        assert_eq!(first.previous(), None);
    }

    #[test]
    fn periods_order_chronologically() {
        let a: Period = "2024-12".parse().unwrap();
        let b: Period = "2025-01".parse().unwrap();
        assert!(a < b);
    }
}
