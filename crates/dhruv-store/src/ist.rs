//! Fixed UTC+5:30 day windows for intake aggregation.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// Label reported alongside IST aggregates.
pub const IST_LABEL: &str = "IST (UTC+5:30)";

const IST_OFFSET_SECS: i64 = 5 * 3600 + 30 * 60;

/// One IST calendar day expressed in UTC. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IstDay {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl IstDay {
    /// The IST day containing `instant`.
    pub fn containing(instant: DateTime<Utc>) -> Self {
        let offset = Duration::seconds(IST_OFFSET_SECS);
        let date = (instant + offset).date_naive();
        let start = date.and_time(NaiveTime::MIN).and_utc() - offset;
        Self {
            date,
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn today() -> Self {
        Self::containing(Utc::now())
    }

    /// `YYYY-MM-DD`.
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_day_bounds_in_utc() {
        let day = IstDay::containing(utc("2026-03-10T12:00:00Z"));
        assert_eq!(day.date_string(), "2026-03-10");
        assert_eq!(day.start, utc("2026-03-09T18:30:00Z"));
        assert_eq!(day.end, utc("2026-03-10T18:30:00Z"));
    }

    #[test]
    fn test_late_utc_evening_is_next_ist_day() {
        let day = IstDay::containing(utc("2026-03-10T19:00:00Z"));
        assert_eq!(day.date_string(), "2026-03-11");
    }

    #[test]
    fn test_start_instant_belongs_to_its_own_day() {
        let day = IstDay::containing(utc("2026-03-09T18:30:00Z"));
        assert_eq!(day.date_string(), "2026-03-10");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(8.453_51), 8.45);
        assert_eq!(round2(250.0), 250.0);
        assert_eq!(round2(1.005_1), 1.01);
    }
}
