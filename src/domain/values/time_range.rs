use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Half-open evaluation window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn lookback(now: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: now - Duration::days(days as i64),
            end: now,
        }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Inclusive range of report dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    /// `days` dates ending at `last`, inclusive.
    pub fn ending(last: NaiveDate, days: u32) -> Self {
        let span = days.max(1) as i64 - 1;
        Self {
            from: last - Duration::days(span),
            to: last,
        }
    }

    pub fn len_days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let from = self.from;
        (0..self.len_days().max(0)).map(move |i| from + Duration::days(i))
    }
}

/// Wall clock of one advertising profile, expressed as a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct ProfileClock {
    offset: FixedOffset,
}

impl ProfileClock {
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes.clamp(-1439, 1439) * 60)
            .unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    pub fn local_hour(&self, now: DateTime<Utc>) -> u32 {
        now.with_timezone(&self.offset).hour()
    }

    /// UTC instant at which the profile-local day containing `now` began.
    pub fn day_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.offset);
        let secs = local.num_seconds_from_midnight() as i64;
        now - Duration::seconds(secs) - Duration::nanoseconds(local.nanosecond() as i64)
    }

    /// Share of the profile-local day already elapsed, in `(0, 1]`.
    pub fn elapsed_day_fraction(&self, now: DateTime<Utc>) -> f64 {
        let secs = now.with_timezone(&self.offset).num_seconds_from_midnight() as f64;
        (secs.max(1.0)) / SECONDS_PER_DAY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_start_respects_offset() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 3, 30, 0).unwrap();
        // UTC-5: local time is 22:30 on the 9th.
        let clock = ProfileClock::new(-300);
        assert_eq!(clock.local_date(now), NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
        assert_eq!(
            clock.day_start(now),
            Utc.with_ymd_and_hms(2026, 3, 9, 5, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_elapsed_fraction() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 9, 36, 0).unwrap();
        let f = ProfileClock::new(0).elapsed_day_fraction(now);
        assert!((f - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_date_range_ending() {
        let last = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let r = DateRange::ending(last, 7);
        assert_eq!(r.from, NaiveDate::from_ymd_opt(2026, 3, 4).unwrap());
        assert_eq!(r.len_days(), 7);
        assert_eq!(r.dates().count(), 7);
    }

    #[test]
    fn test_lookback_window() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap();
        let r = TimeRange::lookback(now, 7);
        assert_eq!(r.days(), 7);
        assert_eq!(r.end, now);
    }
}
