//! Resample frequencies and timezone-local bucket truncation.
//!
//! A frequency string is a positive count followed by a unit: `30m` / `30min`,
//! `6h`, `1d`, `1w`. Buckets are computed on the local wall clock of the
//! timestamp's zone, so `1d` buckets start at local midnight and `1w` buckets
//! start on local Monday midnight.

use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const TRADING_HOURS_PER_DAY: f64 = 6.5;

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;
/// 1970-01-05, the first Monday after the epoch.
const FIRST_MONDAY_OFFSET: i64 = 4 * SECONDS_PER_DAY;
/// Longest spring-forward gap we are prepared to skip over.
const MAX_DST_SHIFT_MINUTES: i64 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrequencyUnit {
    Minute,
    Hour,
    Day,
    Week,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frequency {
    pub count: u32,
    pub unit: FrequencyUnit,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrequencyError {
    #[error("empty frequency")]
    Empty,

    #[error("frequency must start with a positive count: {0}")]
    InvalidCount(String),

    #[error("unknown frequency unit in {0} (expected m, min, h, d or w)")]
    UnknownUnit(String),
}

impl Frequency {
    pub fn new(count: u32, unit: FrequencyUnit) -> Self {
        Frequency { count, unit }
    }

    pub fn daily() -> Self {
        Frequency::new(1, FrequencyUnit::Day)
    }

    fn step_seconds(&self) -> i64 {
        let n = i64::from(self.count);
        match self.unit {
            FrequencyUnit::Minute => n * SECONDS_PER_MINUTE,
            FrequencyUnit::Hour => n * SECONDS_PER_HOUR,
            FrequencyUnit::Day => n * SECONDS_PER_DAY,
            FrequencyUnit::Week => n * 7 * SECONDS_PER_DAY,
        }
    }

    /// Start of the bucket containing `ts`, in `ts`'s own zone.
    pub fn truncate(&self, ts: &DateTime<Tz>) -> DateTime<Tz> {
        let local = ts.naive_local();
        let bucket = self.truncate_naive(local);
        localize(ts.timezone(), bucket)
    }

    fn truncate_naive(&self, local: NaiveDateTime) -> NaiveDateTime {
        let secs = local.and_utc().timestamp();
        let step = self.step_seconds();
        let origin = match self.unit {
            FrequencyUnit::Week => FIRST_MONDAY_OFFSET,
            _ => 0,
        };
        let floored = origin + (secs - origin).div_euclid(step) * step;
        DateTime::from_timestamp(floored, 0)
            .map(|dt| dt.naive_utc())
            .unwrap_or(local)
    }

    /// Convert a look-back expressed in trading days into a number of periods
    /// of this frequency. Never returns less than one period.
    pub fn volatility_window(&self, days: u32) -> usize {
        let days_f = f64::from(days);
        let n = f64::from(self.count);
        let periods = match self.unit {
            FrequencyUnit::Day => days_f,
            FrequencyUnit::Hour => (days_f * TRADING_HOURS_PER_DAY / n).floor(),
            FrequencyUnit::Minute => (days_f * TRADING_HOURS_PER_DAY * 60.0 / n).floor(),
            FrequencyUnit::Week => (days_f / 7.0).floor(),
        };
        (periods as usize).max(1)
    }

    /// Bars per year used for annualising returns and the Sharpe ratio.
    pub fn periods_per_year(&self) -> f64 {
        let n = f64::from(self.count);
        match self.unit {
            FrequencyUnit::Day => TRADING_DAYS_PER_YEAR / n,
            FrequencyUnit::Week => 52.0 / n,
            FrequencyUnit::Hour => TRADING_DAYS_PER_YEAR * TRADING_HOURS_PER_DAY / n,
            FrequencyUnit::Minute => TRADING_DAYS_PER_YEAR * TRADING_HOURS_PER_DAY * 60.0 / n,
        }
    }
}

/// Map a local wall-clock time to an instant in `tz`. Ambiguous times take the
/// earliest instant; times inside a DST gap move forward to the first valid minute.
pub fn localize(tz: Tz, local: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => (1..=MAX_DST_SHIFT_MINUTES)
            .find_map(|m| match tz.from_local_datetime(&(local + Duration::minutes(m))) {
                LocalResult::Single(dt) => Some(dt),
                LocalResult::Ambiguous(earliest, _) => Some(earliest),
                LocalResult::None => None,
            })
            .unwrap_or_else(|| tz.from_utc_datetime(&local)),
    }
}

impl FromStr for Frequency {
    type Err = FrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_lowercase();
        if trimmed.is_empty() {
            return Err(FrequencyError::Empty);
        }

        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split);

        let count: u32 = digits
            .parse()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| FrequencyError::InvalidCount(s.to_string()))?;

        let unit = match unit {
            "m" | "min" => FrequencyUnit::Minute,
            "h" => FrequencyUnit::Hour,
            "d" => FrequencyUnit::Day,
            "w" => FrequencyUnit::Week,
            _ => return Err(FrequencyError::UnknownUnit(s.to_string())),
        };

        Ok(Frequency { count, unit })
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            FrequencyUnit::Minute => "m",
            FrequencyUnit::Hour => "h",
            FrequencyUnit::Day => "d",
            FrequencyUnit::Week => "w",
        };
        write!(f, "{}{}", self.count, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike, Weekday};
    use chrono_tz::America::New_York;

    fn ny(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        New_York.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn parse_units() {
        assert_eq!("1d".parse(), Ok(Frequency::new(1, FrequencyUnit::Day)));
        assert_eq!("6h".parse(), Ok(Frequency::new(6, FrequencyUnit::Hour)));
        assert_eq!("1W".parse(), Ok(Frequency::new(1, FrequencyUnit::Week)));
        assert_eq!("30min".parse(), Ok(Frequency::new(30, FrequencyUnit::Minute)));
        assert_eq!("15m".parse(), Ok(Frequency::new(15, FrequencyUnit::Minute)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!("".parse::<Frequency>(), Err(FrequencyError::Empty));
        assert!(matches!(
            "d".parse::<Frequency>(),
            Err(FrequencyError::InvalidCount(_))
        ));
        assert!(matches!(
            "0d".parse::<Frequency>(),
            Err(FrequencyError::InvalidCount(_))
        ));
        assert!(matches!(
            "3y".parse::<Frequency>(),
            Err(FrequencyError::UnknownUnit(_))
        ));
    }

    #[test]
    fn display_round_trips() {
        for s in ["1d", "6h", "2w", "30m"] {
            let freq: Frequency = s.parse().unwrap();
            assert_eq!(freq.to_string(), s);
        }
    }

    #[test]
    fn truncate_day_is_local_midnight() {
        let bucket = Frequency::daily().truncate(&ny(2024, 3, 13, 14, 37));
        assert_eq!(bucket, ny(2024, 3, 13, 0, 0));
        assert_eq!(bucket.timezone(), New_York);
    }

    #[test]
    fn truncate_six_hours() {
        let freq: Frequency = "6h".parse().unwrap();
        assert_eq!(freq.truncate(&ny(2024, 3, 13, 14, 37)), ny(2024, 3, 13, 12, 0));
        assert_eq!(freq.truncate(&ny(2024, 3, 13, 11, 59)), ny(2024, 3, 13, 6, 0));
    }

    #[test]
    fn truncate_week_starts_monday() {
        let freq: Frequency = "1w".parse().unwrap();
        let bucket = freq.truncate(&ny(2024, 3, 13, 14, 37));
        assert_eq!(bucket.weekday(), Weekday::Mon);
        assert_eq!(bucket, ny(2024, 3, 11, 0, 0));

        // A Monday stays on itself.
        assert_eq!(freq.truncate(&ny(2024, 3, 11, 9, 0)), ny(2024, 3, 11, 0, 0));
        // Sunday belongs to the previous week.
        assert_eq!(freq.truncate(&ny(2024, 3, 17, 23, 0)), ny(2024, 3, 11, 0, 0));
    }

    #[test]
    fn truncate_minutes() {
        let freq: Frequency = "15m".parse().unwrap();
        let bucket = freq.truncate(&ny(2024, 3, 13, 9, 44));
        assert_eq!(bucket.hour(), 9);
        assert_eq!(bucket.minute(), 30);
    }

    #[test]
    fn truncate_uses_local_not_utc_day() {
        // 2024-03-13 22:00 New York is already 03-14 in UTC.
        let ts = ny(2024, 3, 13, 22, 0);
        let bucket = Frequency::daily().truncate(&ts);
        assert_eq!(bucket.day(), 13);
    }

    #[test]
    fn localize_skips_dst_gap() {
        // 2024-03-10 02:30 does not exist in New York.
        let naive = chrono::NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let dt = localize(New_York, naive);
        assert_eq!(dt.hour(), 3);
        assert_eq!(dt.minute(), 0);
    }

    #[test]
    fn localize_ambiguous_takes_earliest() {
        // 2024-11-03 01:30 happens twice in New York.
        let naive = chrono::NaiveDate::from_ymd_opt(2024, 11, 3)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        let dt = localize(New_York, naive);
        assert_eq!(dt.naive_utc().hour(), 5);
    }

    #[test]
    fn volatility_window_conversion() {
        assert_eq!(Frequency::daily().volatility_window(10), 10);
        assert_eq!("1h".parse::<Frequency>().unwrap().volatility_window(2), 13);
        assert_eq!("6h".parse::<Frequency>().unwrap().volatility_window(2), 2);
        assert_eq!("30m".parse::<Frequency>().unwrap().volatility_window(1), 13);
        assert_eq!("1w".parse::<Frequency>().unwrap().volatility_window(30), 4);
        assert_eq!("1w".parse::<Frequency>().unwrap().volatility_window(2), 1);
    }

    #[test]
    fn periods_per_year_by_unit() {
        assert!((Frequency::daily().periods_per_year() - 252.0).abs() < f64::EPSILON);
        assert!(("1w".parse::<Frequency>().unwrap().periods_per_year() - 52.0).abs() < 1e-12);
        assert!(("1h".parse::<Frequency>().unwrap().periods_per_year() - 1638.0).abs() < 1e-9);
    }
}
