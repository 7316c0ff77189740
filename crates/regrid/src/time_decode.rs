//! CF time decoding: turn numeric time values plus a "units since epoch"
//! attribute into calendar year-month stamps.
//!
//! Only month resolution is needed downstream, so stamps are decoded to
//! [`YearMonth`] and sub-day precision in the epoch is ignored. The
//! climate-model calendars that differ from the proleptic Gregorian one
//! (`noleap`/`365_day` and `360_day`) are handled explicitly; decoding
//! them with real-calendar arithmetic would drift by a month or more over
//! a century of monthly samples.

use chrono::{Datelike, Duration, NaiveDate};

use climate_common::{ClimateError, ClimateResult, YearMonth};

/// Days in each month of a no-leap (365-day) year.
const NOLEAP_MONTH_DAYS: [i64; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Calendar {
    Standard,
    NoLeap,
    Day360,
}

impl Calendar {
    fn from_attr(attr: Option<&str>) -> Self {
        match attr.map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("360_day") => Calendar::Day360,
            Some("noleap") | Some("365_day") => Calendar::NoLeap,
            _ => Calendar::Standard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Months,
}

impl TimeUnit {
    fn parse(token: &str) -> Option<Self> {
        match token.trim_end_matches('s') {
            "second" => Some(TimeUnit::Seconds),
            "minute" => Some(TimeUnit::Minutes),
            "hour" => Some(TimeUnit::Hours),
            "day" => Some(TimeUnit::Days),
            "month" => Some(TimeUnit::Months),
            _ => None,
        }
    }

    fn to_days(self, value: f64) -> f64 {
        match self {
            TimeUnit::Seconds => value / 86_400.0,
            TimeUnit::Minutes => value / 1_440.0,
            TimeUnit::Hours => value / 24.0,
            TimeUnit::Days => value,
            TimeUnit::Months => unreachable!("months are decoded by month arithmetic"),
        }
    }
}

/// Epoch date parsed from a units string, day-of-month included.
#[derive(Debug, Clone, Copy)]
struct Epoch {
    year: i32,
    month: u32,
    day: u32,
}

/// Parse a CF units string like `days since 2015-01-16 12:00:00`.
fn parse_units(units: &str) -> ClimateResult<(TimeUnit, Epoch)> {
    let mut parts = units.split_whitespace();
    let unit = parts
        .next()
        .and_then(TimeUnit::parse)
        .ok_or_else(|| ClimateError::NetCdfError(format!("Unsupported time units: {}", units)))?;

    if parts.next() != Some("since") {
        return Err(ClimateError::NetCdfError(format!(
            "Time units missing 'since': {}",
            units
        )));
    }

    let date = parts
        .next()
        .ok_or_else(|| ClimateError::NetCdfError(format!("Time units missing epoch: {}", units)))?;

    let mut fields = date.split('-');
    let year: i32 = fields
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ClimateError::NetCdfError(format!("Bad epoch date: {}", date)))?;
    let month: u32 = fields.next().and_then(|s| s.parse().ok()).unwrap_or(1);
    let day: u32 = fields.next().and_then(|s| s.parse().ok()).unwrap_or(1);

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(ClimateError::NetCdfError(format!("Bad epoch date: {}", date)));
    }

    Ok((unit, Epoch { year, month, day }))
}

/// Year-month reached by adding `months` whole months to an epoch.
fn add_months(year: i32, month: u32, months: i64) -> YearMonth {
    let total = year as i64 * 12 + (month as i64 - 1) + months;
    YearMonth::new(
        total.div_euclid(12) as i32,
        (total.rem_euclid(12) + 1) as u32,
    )
}

fn decode_noleap(epoch: Epoch, offset_days: f64) -> YearMonth {
    let mut year = epoch.year;
    let mut month = epoch.month as usize; // 1-based
    // Remaining days counted from the start of the epoch month.
    let mut days = offset_days + (epoch.day as f64 - 1.0);

    while days < 0.0 {
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
        days += NOLEAP_MONTH_DAYS[month - 1] as f64;
    }
    while days >= NOLEAP_MONTH_DAYS[month - 1] as f64 {
        days -= NOLEAP_MONTH_DAYS[month - 1] as f64;
        if month == 12 {
            month = 1;
            year += 1;
        } else {
            month += 1;
        }
    }
    YearMonth::new(year, month as u32)
}

fn decode_day360(epoch: Epoch, offset_days: f64) -> YearMonth {
    let total = offset_days + (epoch.day as f64 - 1.0);
    let months = (total / 30.0).floor() as i64;
    add_months(epoch.year, epoch.month, months)
}

fn decode_standard(epoch: Epoch, offset_days: f64) -> ClimateResult<YearMonth> {
    let base = NaiveDate::from_ymd_opt(epoch.year, epoch.month, epoch.day).ok_or_else(|| {
        ClimateError::NetCdfError(format!(
            "Invalid epoch date {}-{:02}-{:02}",
            epoch.year, epoch.month, epoch.day
        ))
    })?;
    let date = base + Duration::days(offset_days.floor() as i64);
    Ok(YearMonth::new(date.year(), date.month()))
}

/// Decode raw time values to year-month stamps.
///
/// `calendar` is the CF calendar attribute, if present.
pub fn decode_time(
    values: &[f64],
    units: &str,
    calendar: Option<&str>,
) -> ClimateResult<Vec<YearMonth>> {
    let (unit, epoch) = parse_units(units)?;
    let cal = Calendar::from_attr(calendar);

    values
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                return Err(ClimateError::NetCdfError(
                    "Non-finite time value".to_string(),
                ));
            }
            if unit == TimeUnit::Months {
                return Ok(add_months(epoch.year, epoch.month, v.round() as i64));
            }
            let days = unit.to_days(v);
            match cal {
                Calendar::Standard => decode_standard(epoch, days),
                Calendar::NoLeap => Ok(decode_noleap(epoch, days)),
                Calendar::Day360 => Ok(decode_day360(epoch, days)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_since_standard() {
        // Mid-month stamps for Jan..Mar 2015.
        let stamps = decode_time(&[15.5, 45.0, 74.5], "days since 2015-01-01", None).unwrap();
        assert_eq!(stamps[0], YearMonth::new(2015, 1));
        assert_eq!(stamps[1], YearMonth::new(2015, 2));
        assert_eq!(stamps[2], YearMonth::new(2015, 3));
    }

    #[test]
    fn test_hours_since() {
        let stamps = decode_time(&[0.0, 24.0 * 40.0], "hours since 2015-01-01", None).unwrap();
        assert_eq!(stamps[0], YearMonth::new(2015, 1));
        assert_eq!(stamps[1], YearMonth::new(2015, 2));
    }

    #[test]
    fn test_months_since() {
        let stamps =
            decode_time(&[0.0, 11.0, 12.0], "months since 2015-01-16", Some("360_day")).unwrap();
        assert_eq!(stamps[0], YearMonth::new(2015, 1));
        assert_eq!(stamps[1], YearMonth::new(2015, 12));
        assert_eq!(stamps[2], YearMonth::new(2016, 1));
    }

    #[test]
    fn test_360_day_calendar_does_not_drift() {
        // 86 model years of monthly mid-month stamps, 30-day months.
        let n = 86 * 12;
        let values: Vec<f64> = (0..n).map(|i| 15.0 + 30.0 * i as f64).collect();
        let stamps =
            decode_time(&values, "days since 2015-01-01", Some("360_day")).unwrap();
        assert_eq!(stamps[0], YearMonth::new(2015, 1));
        assert_eq!(stamps[n - 1], YearMonth::new(2100, 12));
    }

    #[test]
    fn test_noleap_calendar_does_not_drift() {
        // Stamps at the start of each noleap year.
        let values: Vec<f64> = (0..86).map(|i| 365.0 * i as f64).collect();
        let stamps = decode_time(&values, "days since 2015-01-01", Some("noleap")).unwrap();
        assert_eq!(stamps[0], YearMonth::new(2015, 1));
        assert_eq!(stamps[85], YearMonth::new(2100, 1));
    }

    #[test]
    fn test_noleap_negative_offset() {
        let stamps = decode_time(&[-16.0], "days since 2015-01-01", Some("365_day")).unwrap();
        assert_eq!(stamps[0], YearMonth::new(2014, 12));
    }

    #[test]
    fn test_rejects_unknown_units() {
        assert!(decode_time(&[0.0], "fortnights since 2015-01-01", None).is_err());
        assert!(decode_time(&[0.0], "days until 2015-01-01", None).is_err());
    }
}
