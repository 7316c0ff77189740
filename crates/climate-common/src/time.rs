//! Year-month tokens as used in archive file names.

use serde::{Deserialize, Serialize};

/// A YYYYMM token from the archive naming grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Parse a strict 6-digit YYYYMM token. Month must be 01..12.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let year: i32 = s[..4].parse().ok()?;
        let month: u32 = s[4..].parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        Some(Self { year, month })
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let ym = YearMonth::parse("201501").unwrap();
        assert_eq!(ym.year, 2015);
        assert_eq!(ym.month, 1);
        assert_eq!(ym.to_string(), "201501");
    }

    #[test]
    fn test_parse_rejects_bad_tokens() {
        assert!(YearMonth::parse("2015").is_none());
        assert!(YearMonth::parse("201513").is_none());
        assert!(YearMonth::parse("201500").is_none());
        assert!(YearMonth::parse("20150a").is_none());
        assert!(YearMonth::parse("2015011").is_none());
    }

    #[test]
    fn test_ordering() {
        assert!(YearMonth::parse("201501").unwrap() < YearMonth::parse("210012").unwrap());
        assert!(YearMonth::parse("201512").unwrap() > YearMonth::parse("201501").unwrap());
    }
}
