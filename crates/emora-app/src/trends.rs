//! Textual trend report over the event log.
//!
//! Mirrors the chart views: work-day emotion counts, the happy series by
//! hour / weekday / day-of-month, the year-by-month totals, most-common
//! emotion for today and this week, and the per-period dominant trend.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use emora_store::{analytics, EventStore, StoreError};
use std::fmt::Write;

const NO_DATA: &str = "no data";

/// Build the report for the day, week, month and year containing `now`.
pub fn trend_report(store: &EventStore, now: NaiveDateTime) -> Result<String, StoreError> {
    let today = now.date();
    let day_start = today.and_time(NaiveTime::MIN);
    let day_end = day_start + Duration::seconds(86_399);

    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    let week_start = monday.and_time(NaiveTime::MIN);
    let week_end = week_start + Duration::days(7) - Duration::seconds(1);

    let month_first = today.with_day(1).unwrap_or(today);
    let month_days = analytics::days_in_month(today.year(), today.month());
    let month_start = month_first.and_time(NaiveTime::MIN);
    let month_end = month_start + Duration::days(month_days as i64) - Duration::seconds(1);

    let year_first = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
    let year_start = year_first.and_time(NaiveTime::MIN);
    let year_end = NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
        .unwrap_or(today)
        .and_time(NaiveTime::MIN)
        - Duration::seconds(1);

    let today_events = store.events_between(day_start, day_end)?;
    let week_events = store.events_between(week_start, week_end)?;
    let month_events = store.events_between(month_start, month_end)?;
    let year_events = store.events_between(year_start, year_end)?;

    let common_today = store.most_common_emotion(day_start, day_end)?;
    let common_week = store.most_common_emotion(week_start, week_end)?;

    let hour_series = analytics::hour_of_day_series(&today_events);
    let happy_today = analytics::happy_hour_of_day(&today_events);
    let happy_week = analytics::happy_day_of_week(&week_events);
    let month_series = analytics::day_of_month_series(&month_events, today.year(), today.month());
    let year_series = analytics::month_of_year_series(&year_events);
    let periods = analytics::dominant_by_period(&today_events);

    let mut out = String::new();
    let _ = writeln!(out, "Emotion trends for {today}");
    let _ = writeln!(
        out,
        "Most common today: {}",
        common_today.as_deref().unwrap_or(NO_DATA)
    );
    let _ = writeln!(
        out,
        "Most common this week: {}",
        common_week.as_deref().unwrap_or(NO_DATA)
    );

    let _ = writeln!(out, "Work-day counts by hour (06:00-18:00):");
    if hour_series.is_empty() {
        let _ = writeln!(out, "  {NO_DATA}");
    } else {
        for (emotion, counts) in &hour_series {
            let _ = writeln!(out, "  {emotion:<9} {}", join_counts(counts));
        }
    }

    let _ = writeln!(out, "Happy by hour (06:00-18:00): {}", join_counts(&happy_today));
    let _ = writeln!(out, "Happy by weekday (Mon-Fri):  {}", join_counts(&happy_week));

    let happy_month = month_series
        .get(analytics::HAPPY_LABEL)
        .map(|counts| join_counts(counts))
        .unwrap_or_else(|| join_counts(&vec![0; analytics::days_in_month(today.year(), today.month())]));
    let _ = writeln!(out, "Happy this month by day:     {happy_month}");

    let mut by_month = vec![0u32; analytics::YEAR_BUCKETS];
    for counts in year_series.values() {
        for (slot, count) in by_month.iter_mut().zip(counts) {
            *slot += count;
        }
    }
    let _ = writeln!(out, "Events this year by month:   {}", join_counts(&by_month));

    let period_line = periods
        .iter()
        .map(|(period, label)| {
            format!("{}: {}", period.label(), label.as_deref().unwrap_or(NO_DATA))
        })
        .collect::<Vec<_>>()
        .join(" | ");
    let _ = writeln!(out, "Today by period: {period_line}");

    Ok(out)
}

fn join_counts(counts: &[u32]) -> String {
    counts
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
