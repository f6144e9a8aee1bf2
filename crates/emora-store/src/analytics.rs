//! Calendar-bucketed aggregation over the detection event log.
//!
//! All series are computed over an explicit caller-supplied window of
//! events (see [`EventStore::events_between`](crate::store::EventStore));
//! bucketing is pure calendar arithmetic on the stored timestamp, never
//! elapsed-seconds arithmetic, so month boundaries and DST shifts fall
//! out of the date itself. Events outside a view's filter are silently
//! excluded; an empty window yields all-zero buckets.

use crate::store::DetectionEvent;
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use std::collections::BTreeMap;

/// First hour of the work-hours window (inclusive).
pub const WORK_HOURS_START: u32 = 6;
/// Last hour of the work-hours window (inclusive).
pub const WORK_HOURS_END: u32 = 18;
/// Hour buckets in the work-day view: 06:00 through 18:00.
pub const WORK_DAY_BUCKETS: usize = (WORK_HOURS_END - WORK_HOURS_START + 1) as usize;
/// Day buckets in the work-week view: Monday through Friday.
pub const WORK_WEEK_BUCKETS: usize = 5;
/// Month buckets in the year view.
pub const YEAR_BUCKETS: usize = 12;

/// Label used by the dedicated happy-trend views.
pub const HAPPY_LABEL: &str = "happy";

/// Per-emotion counts over the 13 work-day hour buckets.
///
/// An event lands in bucket `hour - 6` when `6 <= hour <= 18`; anything
/// outside the work-hours window is excluded from this view.
pub fn hour_of_day_series(events: &[DetectionEvent]) -> BTreeMap<String, Vec<u32>> {
    bucketize(events, WORK_DAY_BUCKETS, work_hour_index)
}

/// Per-emotion counts over Monday..Friday, counting only events whose
/// hour falls inside the work-hours window.
pub fn day_of_week_series(events: &[DetectionEvent]) -> BTreeMap<String, Vec<u32>> {
    bucketize(events, WORK_WEEK_BUCKETS, work_week_index)
}

/// Per-emotion counts with one bucket per calendar day of the target
/// month; events from other months are excluded.
pub fn day_of_month_series(
    events: &[DetectionEvent],
    year: i32,
    month: u32,
) -> BTreeMap<String, Vec<u32>> {
    let buckets = days_in_month(year, month);
    bucketize(events, buckets, move |e| {
        let date = e.timestamp.date();
        if date.year() == year && date.month() == month {
            Some(date.day0() as usize)
        } else {
            None
        }
    })
}

/// Per-emotion counts over the 12 months; bucket index is `month - 1`.
pub fn month_of_year_series(events: &[DetectionEvent]) -> BTreeMap<String, Vec<u32>> {
    bucketize(events, YEAR_BUCKETS, |e| Some(e.timestamp.month0() as usize))
}

/// The happy-only work-day series: the generic hour-of-day view with a
/// fixed `happy` filter.
pub fn happy_hour_of_day(events: &[DetectionEvent]) -> Vec<u32> {
    single_label_series(events, HAPPY_LABEL, WORK_DAY_BUCKETS, work_hour_index)
}

/// The happy-only work-week series.
pub fn happy_day_of_week(events: &[DetectionEvent]) -> Vec<u32> {
    single_label_series(events, HAPPY_LABEL, WORK_WEEK_BUCKETS, work_week_index)
}

/// Number of days in a calendar month; 0 for an invalid year/month.
pub fn days_in_month(year: i32, month: u32) -> usize {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match next {
        Some(next) => (next - first).num_days() as usize,
        None => 0,
    }
}

/// The three fixed sub-windows of a day used by the dominant-emotion trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPeriod {
    Morning,
    Afternoon,
    Evening,
}

impl DayPeriod {
    pub const ALL: [DayPeriod; 3] = [DayPeriod::Morning, DayPeriod::Afternoon, DayPeriod::Evening];

    pub fn label(&self) -> &'static str {
        match self {
            DayPeriod::Morning => "Morning",
            DayPeriod::Afternoon => "Afternoon",
            DayPeriod::Evening => "Evening",
        }
    }

    /// Whether a time of day falls inside this period.
    ///
    /// Morning 06:00:00–12:00:00, Afternoon 12:00:01–18:00:00,
    /// Evening 18:00:01–23:59:59. Times before 06:00 belong to no period.
    pub fn contains(&self, time: NaiveTime) -> bool {
        let s = time.num_seconds_from_midnight();
        match self {
            DayPeriod::Morning => (21_600..=43_200).contains(&s),
            DayPeriod::Afternoon => (43_201..=64_800).contains(&s),
            DayPeriod::Evening => (64_801..=86_399).contains(&s),
        }
    }
}

/// Most common emotion per day period, `None` where a period holds no
/// events. Ties break like the store query: highest count, then
/// lexicographically smallest label.
pub fn dominant_by_period(events: &[DetectionEvent]) -> [(DayPeriod, Option<String>); 3] {
    DayPeriod::ALL.map(|period| {
        let labels = events
            .iter()
            .filter(|e| period.contains(e.timestamp.time()))
            .map(|e| e.emotion.as_str());
        (period, most_common_label(labels))
    })
}

fn work_hour_index(event: &DetectionEvent) -> Option<usize> {
    let hour = event.timestamp.hour();
    if (WORK_HOURS_START..=WORK_HOURS_END).contains(&hour) {
        Some((hour - WORK_HOURS_START) as usize)
    } else {
        None
    }
}

fn work_week_index(event: &DetectionEvent) -> Option<usize> {
    let day = event.timestamp.weekday().num_days_from_monday() as usize;
    if day < WORK_WEEK_BUCKETS && work_hour_index(event).is_some() {
        Some(day)
    } else {
        None
    }
}

fn bucketize(
    events: &[DetectionEvent],
    buckets: usize,
    index: impl Fn(&DetectionEvent) -> Option<usize>,
) -> BTreeMap<String, Vec<u32>> {
    let mut series: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for event in events {
        let Some(i) = index(event) else {
            continue;
        };
        if i >= buckets {
            continue;
        }
        series
            .entry(event.emotion.clone())
            .or_insert_with(|| vec![0; buckets])[i] += 1;
    }
    series
}

fn single_label_series(
    events: &[DetectionEvent],
    label: &str,
    buckets: usize,
    index: impl Fn(&DetectionEvent) -> Option<usize>,
) -> Vec<u32> {
    let mut counts = vec![0u32; buckets];
    for event in events.iter().filter(|e| e.emotion == label) {
        if let Some(i) = index(event) {
            if i < buckets {
                counts[i] += 1;
            }
        }
    }
    counts
}

fn most_common_label<'a>(labels: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
        .map(|(label, _)| label.to_string())
}
