//! Calendar arithmetic for tracking days that begin at a fixed local hour.

use chrono::{
    DateTime, Datelike, Duration, Local, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Timelike,
};

/// Local hour at which a tracking day begins.
pub const DAY_CUTOFF_HOUR: u32 = 6;

/// Half-open interval `[start, end)` in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl TimeRange {
    pub fn new(start: DateTime<Local>, end: DateTime<Local>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: DateTime<Local>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Seconds of `[start, end)` that fall inside this range.
    pub fn overlap_seconds(&self, start: DateTime<Local>, end: DateTime<Local>) -> i64 {
        let slice_start = if start > self.start { start } else { self.start };
        let slice_end = if end < self.end { end } else { self.end };
        if slice_end > slice_start {
            (slice_end - slice_start).num_seconds()
        } else {
            0
        }
    }
}

/// Current local time truncated to whole seconds.
pub fn now() -> DateTime<Local> {
    truncate_to_second(Local::now())
}

pub fn truncate_to_second(timestamp: DateTime<Local>) -> DateTime<Local> {
    timestamp.with_nanosecond(0).unwrap_or(timestamp)
}

/// Calendar date whose cutoff instant opens the tracking day containing `timestamp`.
pub fn tracking_date(timestamp: DateTime<Local>) -> NaiveDate {
    let local = timestamp.with_timezone(&Local);
    let date = local.date_naive();
    if local.hour() < DAY_CUTOFF_HOUR {
        shift_days(date, -1)
    } else {
        date
    }
}

/// The cutoff instant on `date`.
pub fn cutoff_on(date: NaiveDate) -> DateTime<Local> {
    let naive = date.and_time(NaiveTime::default()) + Duration::hours(DAY_CUTOFF_HOUR.into());
    resolve_local(naive)
}

pub fn day_start(timestamp: DateTime<Local>) -> DateTime<Local> {
    cutoff_on(tracking_date(timestamp))
}

/// Start of the following tracking day. Outside DST transitions this is exactly
/// `day_start + 24h`; across a transition the wall-clock cutoff wins.
pub fn day_end(timestamp: DateTime<Local>) -> DateTime<Local> {
    cutoff_on(shift_days(tracking_date(timestamp), 1))
}

pub fn day_range(timestamp: DateTime<Local>) -> TimeRange {
    TimeRange::new(day_start(timestamp), day_end(timestamp))
}

/// Monday-anchored week made of shifted days.
pub fn week_range(timestamp: DateTime<Local>) -> TimeRange {
    let day = tracking_date(timestamp);
    let monday = shift_days(day, -i64::from(day.weekday().num_days_from_monday()));
    TimeRange::new(cutoff_on(monday), cutoff_on(shift_days(monday, 7)))
}

/// Calendar month anchored at the cutoff on the 1st.
pub fn month_range(timestamp: DateTime<Local>) -> TimeRange {
    let day = tracking_date(timestamp);
    let first = day.with_day(1).unwrap_or(day);
    let next = first.checked_add_months(Months::new(1)).unwrap_or(first);
    TimeRange::new(cutoff_on(first), cutoff_on(next))
}

/// Calendar year anchored at the cutoff on January 1st.
pub fn year_range(timestamp: DateTime<Local>) -> TimeRange {
    let day = tracking_date(timestamp);
    let first = day.with_ordinal(1).unwrap_or(day);
    let next = first.checked_add_months(Months::new(12)).unwrap_or(first);
    TimeRange::new(cutoff_on(first), cutoff_on(next))
}

/// Cuts `[start, end)` at every tracking-day boundary it crosses.
pub fn split_by_day_boundary(start: DateTime<Local>, end: DateTime<Local>) -> Vec<TimeRange> {
    let mut fragments = Vec::new();
    if end <= start {
        return fragments;
    }

    let mut cursor = start;
    loop {
        let boundary = day_end(cursor);
        let segment_end = if boundary < end { boundary } else { end };
        fragments.push(TimeRange::new(cursor, segment_end));
        if segment_end >= end {
            break;
        }
        cursor = segment_end;
    }

    fragments
}

pub fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days)).unwrap_or(date)
}

/// Maps a local wall-clock time to an instant. Ambiguous times take the earlier
/// instant; times inside a DST gap move forward to the first valid minute.
pub fn resolve_local(naive: NaiveDateTime) -> DateTime<Local> {
    if let Some(timestamp) = local_from_naive(naive) {
        return timestamp;
    }

    let mut cursor = naive + Duration::minutes(1);
    for _ in 0..120 {
        if let Some(timestamp) = local_from_naive(cursor) {
            return timestamp;
        }
        cursor += Duration::minutes(1);
    }

    Local.from_utc_datetime(&naive)
}

fn local_from_naive(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(timestamp) => Some(timestamp),
        LocalResult::Ambiguous(first, second) => Some(first.min(second)),
        LocalResult::None => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Local, NaiveDate, TimeZone, Timelike, Weekday, Datelike};

    use super::{
        day_end, day_start, month_range, split_by_day_boundary, tracking_date, week_range,
        year_range, TimeRange,
    };

    fn local(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> chrono::DateTime<Local> {
        Local
            .with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .expect("test instant should be unambiguous")
    }

    #[test]
    fn day_starts_at_cutoff_on_previous_date_before_six() {
        let start = day_start(local(2026, 1, 15, 5, 59, 59));
        assert_eq!(start, local(2026, 1, 14, 6, 0, 0));
    }

    #[test]
    fn day_starts_at_cutoff_on_same_date_from_six() {
        assert_eq!(day_start(local(2026, 1, 15, 6, 0, 0)), local(2026, 1, 15, 6, 0, 0));
        assert_eq!(day_start(local(2026, 1, 15, 23, 30, 0)), local(2026, 1, 15, 6, 0, 0));
    }

    #[test]
    fn day_end_is_next_cutoff() {
        let timestamp = local(2026, 1, 15, 12, 0, 0);
        assert_eq!(day_end(timestamp), local(2026, 1, 16, 6, 0, 0));
        assert_eq!(day_end(timestamp) - day_start(timestamp), Duration::hours(24));
    }

    #[test]
    fn week_is_monday_anchored_with_shifted_days() {
        // 2026-01-19 is a Monday; 05:00 on it still belongs to Sunday's tracking day.
        let range = week_range(local(2026, 1, 19, 5, 0, 0));
        assert_eq!(range.start, local(2026, 1, 12, 6, 0, 0));
        assert_eq!(range.end, local(2026, 1, 19, 6, 0, 0));
        assert_eq!(range.start.weekday(), Weekday::Mon);

        let range = week_range(local(2026, 1, 19, 7, 0, 0));
        assert_eq!(range.start, local(2026, 1, 19, 6, 0, 0));
        assert_eq!(range.end, local(2026, 1, 26, 6, 0, 0));
    }

    #[test]
    fn month_rolls_over_december() {
        let range = month_range(local(2025, 12, 20, 10, 0, 0));
        assert_eq!(range.start, local(2025, 12, 1, 6, 0, 0));
        assert_eq!(range.end, local(2026, 1, 1, 6, 0, 0));
    }

    #[test]
    fn early_hours_of_first_belong_to_previous_month() {
        let range = month_range(local(2026, 3, 1, 4, 0, 0));
        assert_eq!(range.start, local(2026, 2, 1, 6, 0, 0));
        assert_eq!(range.end, local(2026, 3, 1, 6, 0, 0));
    }

    #[test]
    fn year_starts_on_january_first_cutoff() {
        let range = year_range(local(2026, 7, 4, 12, 0, 0));
        assert_eq!(range.start, local(2026, 1, 1, 6, 0, 0));
        assert_eq!(range.end, local(2027, 1, 1, 6, 0, 0));
    }

    #[test]
    fn tracking_date_follows_cutoff() {
        assert_eq!(
            tracking_date(local(2026, 1, 1, 2, 0, 0)),
            NaiveDate::from_ymd_opt(2025, 12, 31).expect("valid date")
        );
    }

    #[test]
    fn splits_interval_at_each_boundary() {
        let fragments = split_by_day_boundary(local(2026, 1, 10, 22, 0, 0), local(2026, 1, 12, 8, 0, 0));
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].end, local(2026, 1, 11, 6, 0, 0));
        assert_eq!(fragments[1].start, local(2026, 1, 11, 6, 0, 0));
        assert_eq!(fragments[1].end, local(2026, 1, 12, 6, 0, 0));
        assert_eq!(fragments[2].end.hour(), 8);
    }

    #[test]
    fn split_of_empty_interval_is_empty() {
        let instant = local(2026, 1, 10, 22, 0, 0);
        assert!(split_by_day_boundary(instant, instant).is_empty());
        assert!(split_by_day_boundary(instant, instant - Duration::hours(1)).is_empty());
    }

    #[test]
    fn overlap_is_clamped_to_range() {
        let range = TimeRange::new(local(2026, 1, 10, 6, 0, 0), local(2026, 1, 11, 6, 0, 0));
        assert_eq!(range.overlap_seconds(local(2026, 1, 10, 5, 0, 0), local(2026, 1, 10, 7, 0, 0)), 3600);
        assert_eq!(range.overlap_seconds(local(2026, 1, 11, 7, 0, 0), local(2026, 1, 11, 8, 0, 0)), 0);
    }
}
