use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};

use crate::aggregate::percentage;
use crate::config::MAX_DAILY_WINDOW_DAYS;
use crate::error::ReportError;
use crate::models::{AttendanceRecord, Bucket, TrendSeries};

pub const WEEK_LABELS: [&str; 5] = ["Week 1", "Week 2", "Week 3", "Week 4", "Week 5"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketMode {
    /// Ordinal week of the month, pooled across months.
    Weekly,
    /// Rolling window of calendar days ending today.
    Daily,
}

impl FromStr for BucketMode {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "daily" => Ok(Self::Daily),
            _ => Err(ReportError::InvalidBucketMode(value.to_string())),
        }
    }
}

impl fmt::Display for BucketMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekly => f.write_str("weekly"),
            Self::Daily => f.write_str("daily"),
        }
    }
}

/// Zero-based week of month: `floor((day - 1 + weekday_of_first) / 7)`,
/// with Sunday as weekday 0. Ranges over 0..=5.
pub fn week_of_month(date: NaiveDate) -> usize {
    let day_index = date.day0() as usize;
    let weekday = date.weekday().num_days_from_sunday() as usize;
    let first_weekday = (weekday + 7 - day_index % 7) % 7;
    (day_index + first_weekday) / 7
}

pub fn weekly_buckets(records: &[AttendanceRecord]) -> Vec<Bucket> {
    let mut counts = [(0usize, 0usize); WEEK_LABELS.len()];

    for record in records {
        // Index 5 only happens on the 29th-31st of late-starting months and has no label.
        let Some(slot) = counts.get_mut(week_of_month(record.date)) else {
            continue;
        };
        slot.1 += 1;
        if record.is_present() {
            slot.0 += 1;
        }
    }

    WEEK_LABELS
        .iter()
        .zip(counts)
        .filter(|(_, (_, total))| *total > 0)
        .map(|(label, (present, total))| Bucket {
            label: label.to_string(),
            present,
            total,
            percentage: Some(percentage(present, total)),
        })
        .collect()
}

pub fn daily_buckets(records: &[AttendanceRecord], today: NaiveDate, window_days: u32) -> Vec<Bucket> {
    let window_days = window_days.min(MAX_DAILY_WINDOW_DAYS);
    if window_days == 0 {
        return Vec::new();
    }

    let Some(start) = today.checked_sub_signed(Duration::days(i64::from(window_days) - 1)) else {
        return Vec::new();
    };
    let mut counts = vec![(0usize, 0usize); window_days as usize];

    for record in records {
        let offset = (record.date - start).num_days();
        if offset < 0 || offset >= i64::from(window_days) {
            continue;
        }
        let slot = &mut counts[offset as usize];
        slot.1 += 1;
        if record.is_present() {
            slot.0 += 1;
        }
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(offset, (present, total))| Bucket {
            label: (start + Duration::days(offset as i64))
                .format("%Y-%m-%d")
                .to_string(),
            present,
            total,
            percentage: (total > 0).then(|| percentage(present, total)),
        })
        .collect()
}

pub fn to_series(buckets: &[Bucket]) -> TrendSeries {
    TrendSeries {
        labels: buckets.iter().map(|bucket| bucket.label.clone()).collect(),
        values: buckets.iter().map(|bucket| bucket.percentage).collect(),
    }
}

pub fn bucketize(
    records: &[AttendanceRecord],
    mode: BucketMode,
    today: NaiveDate,
    window_days: u32,
) -> TrendSeries {
    let buckets = match mode {
        BucketMode::Weekly => weekly_buckets(records),
        BucketMode::Daily => daily_buckets(records, today, window_days),
    };
    to_series(&buckets)
}
