use std::collections::BTreeMap;

use crate::models::{AggregateStat, AttendanceRecord};

/// Rounded attendance rate, half away from zero. Zero when nothing was recorded.
pub fn percentage(present: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (present as f64 / total as f64 * 100.0).round() as u32
}

pub fn summarize(subject_id: &str, records: &[AttendanceRecord]) -> AggregateStat {
    let total = records.len();
    let present = records.iter().filter(|record| record.is_present()).count();

    AggregateStat {
        subject_id: subject_id.to_string(),
        total,
        present,
        absent: total - present,
        percentage: percentage(present, total),
    }
}

/// One stat per distinct subject in `records`, ordered by subject id.
pub fn summarize_by_subject(records: &[AttendanceRecord]) -> Vec<AggregateStat> {
    let mut grouped: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for record in records {
        let entry = grouped.entry(record.subject_id.as_str()).or_default();
        entry.0 += 1;
        if record.is_present() {
            entry.1 += 1;
        }
    }

    grouped
        .into_iter()
        .map(|(subject_id, (total, present))| AggregateStat {
            subject_id: subject_id.to_string(),
            total,
            present,
            absent: total - present,
            percentage: percentage(present, total),
        })
        .collect()
}
