use std::collections::HashMap;
use std::fmt::{self, Write};
use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::aggregate;
use crate::buckets::{self, BucketMode};
use crate::config::Settings;
use crate::coordinator::{self, BatchRecords};
use crate::error::ReportError;
use crate::models::{
    AbsentToday, AggregateStat, BatchOverview, BatchTrend, ClassHistory, ClassHistoryRow, Student,
    StudentOverview, StudentSnapshot,
};
use crate::store::AttendanceStore;

/// Attendance at or above this percentage is healthy.
pub const GOOD_ATTENDANCE_THRESHOLD: u32 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttendanceStatus {
    Good,
    Poor,
}

impl AttendanceStatus {
    pub fn from_percentage(percentage: u32) -> Self {
        if percentage >= GOOD_ATTENDANCE_THRESHOLD {
            Self::Good
        } else {
            Self::Poor
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => f.write_str("Good"),
            Self::Poor => f.write_str("Poor"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub today: NaiveDate,
    pub window_days: u32,
    pub concurrency: usize,
}

impl ReportOptions {
    pub fn from_settings(settings: &Settings, today: NaiveDate) -> Self {
        Self {
            today,
            window_days: settings.daily_window_days,
            concurrency: settings.fetch_concurrency,
        }
    }
}

/// Runs `report` with an overall deadline. In-flight fetches are dropped on expiry.
pub async fn with_timeout<T, F>(limit: Duration, report: F) -> Result<T, ReportError>
where
    F: Future<Output = Result<T, ReportError>>,
{
    match tokio::time::timeout(limit, report).await {
        Ok(result) => result,
        Err(_) => Err(ReportError::TimedOut(limit)),
    }
}

pub async fn compute_student_summary(
    store: &dyn AttendanceStore,
    subject_id: &str,
) -> Result<AggregateStat, ReportError> {
    let records = store.attendance_history(subject_id).await?;
    Ok(aggregate::summarize(subject_id, &records))
}

pub async fn compute_faculty_summary(
    store: &dyn AttendanceStore,
    email: &str,
) -> Result<AggregateStat, ReportError> {
    let records = store.faculty_attendance_history(email).await?;
    Ok(aggregate::summarize(email, &records))
}

/// Summary plus the mark for `today`, if one was recorded.
pub async fn compute_student_snapshot(
    store: &dyn AttendanceStore,
    subject_id: &str,
    today: NaiveDate,
) -> Result<StudentSnapshot, ReportError> {
    let records = store.attendance_history(subject_id).await?;
    let stat = aggregate::summarize(subject_id, &records);
    let status = AttendanceStatus::from_percentage(stat.percentage);
    let today = records.into_iter().find(|record| record.date == today);

    Ok(StudentSnapshot { stat, status, today })
}

/// Trend for a batch. `mode` is checked before anything is fetched.
pub async fn compute_batch_trend(
    store: &dyn AttendanceStore,
    batch: &str,
    mode: &str,
    options: &ReportOptions,
) -> Result<BatchTrend, ReportError> {
    let mode: BucketMode = mode.parse()?;
    let fetched = coordinator::fetch_batch(store, batch, options.concurrency).await?;
    Ok(trend_from_records(&fetched, mode, options))
}

pub fn trend_from_records(fetched: &BatchRecords, mode: BucketMode, options: &ReportOptions) -> BatchTrend {
    let records = fetched.flatten();
    BatchTrend {
        batch: fetched.batch.clone(),
        mode: mode.to_string(),
        series: buckets::bucketize(&records, mode, options.today, options.window_days),
        skipped: fetched.skipped(),
    }
}

pub async fn compute_batch_overview(
    store: &dyn AttendanceStore,
    batch: &str,
    concurrency: usize,
) -> Result<BatchOverview, ReportError> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("batch_overview", %run_id, batch);

    async {
        let fetched = coordinator::fetch_batch(store, batch, concurrency).await?;
        let overview = overview_from_records(&fetched);
        tracing::info!(
            students = overview.students.len(),
            skipped = overview.skipped,
            "batch overview computed"
        );
        Ok::<_, ReportError>(overview)
    }
    .instrument(span)
    .await
}

pub fn overview_from_records(fetched: &BatchRecords) -> BatchOverview {
    let records = fetched.flatten();
    let mut by_subject: HashMap<String, AggregateStat> = aggregate::summarize_by_subject(&records)
        .into_iter()
        .map(|stat| (stat.subject_id.clone(), stat))
        .collect();

    let students = fetched
        .students
        .iter()
        .map(|entry| {
            let enrollment_no = &entry.student.enrollment_no;
            let stat = by_subject
                .remove(enrollment_no)
                .unwrap_or_else(|| aggregate::summarize(enrollment_no, &[]));
            StudentOverview {
                student: entry.student.clone(),
                status: AttendanceStatus::from_percentage(stat.percentage),
                stat,
            }
        })
        .collect();

    BatchOverview {
        batch: fetched.batch.clone(),
        overall: aggregate::summarize(&fetched.batch, &records),
        students,
        skipped: fetched.skipped(),
        skipped_subjects: fetched.skipped_subjects.clone(),
    }
}

/// Every mark recorded for a batch, optionally limited to one day.
pub async fn compute_class_history(
    store: &dyn AttendanceStore,
    batch: &str,
    date: Option<NaiveDate>,
    concurrency: usize,
) -> Result<ClassHistory, ReportError> {
    let fetched = coordinator::fetch_batch(store, batch, concurrency).await?;
    Ok(class_history_from_records(&fetched, date))
}

pub fn class_history_from_records(fetched: &BatchRecords, date: Option<NaiveDate>) -> ClassHistory {
    let mut rows: Vec<ClassHistoryRow> = fetched
        .students
        .iter()
        .flat_map(|entry| {
            entry
                .records
                .iter()
                .filter(|record| date.map_or(true, |day| record.date == day))
                .map(|record| ClassHistoryRow {
                    student: entry.student.clone(),
                    date: record.date,
                    present: record.is_present(),
                })
        })
        .collect();
    rows.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.student.roll_no.cmp(&b.student.roll_no))
    });

    ClassHistory {
        batch: fetched.batch.clone(),
        date,
        rows,
        skipped_subjects: fetched.skipped_subjects.clone(),
    }
}

/// Students across every batch with no present mark on `today`.
///
/// A student whose history could not be fetched is listed as skipped, not
/// as absent.
pub async fn compute_absent_today(
    store: &dyn AttendanceStore,
    branch: Option<&str>,
    today: NaiveDate,
    concurrency: usize,
) -> Result<AbsentToday, ReportError> {
    let mut absent = AbsentToday {
        date: today,
        branch: branch.map(str::to_string),
        students: Vec::new(),
        skipped_subjects: Vec::new(),
    };

    for batch in store.list_batches().await? {
        let fetched = coordinator::fetch_batch(store, &batch, concurrency).await?;
        let in_branch = |student: &Student| branch.map_or(true, |b| student.branch == b);

        for entry in fetched.students.into_iter().filter(|entry| in_branch(&entry.student)) {
            let present_today = entry
                .records
                .iter()
                .any(|record| record.date == today && record.is_present());
            if !present_today {
                absent.students.push(entry.student);
            }
        }
        absent.skipped_subjects.extend(fetched.skipped_subjects);
    }

    tracing::info!(
        %today,
        branch = branch.unwrap_or("all"),
        absent = absent.students.len(),
        "absent list computed"
    );
    Ok(absent)
}

/// Full batch report: overview, weekly and daily trends from one fetch.
pub async fn compute_batch_report(
    store: &dyn AttendanceStore,
    batch: &str,
    options: &ReportOptions,
) -> Result<String, ReportError> {
    let fetched = coordinator::fetch_batch(store, batch, options.concurrency).await?;
    let overview = overview_from_records(&fetched);
    let weekly = trend_from_records(&fetched, BucketMode::Weekly, options);
    let daily = trend_from_records(&fetched, BucketMode::Daily, options);
    Ok(build_report(&overview, &weekly, &daily, options.today))
}

pub fn render_overview(overview: &BatchOverview) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "## Attendance Overview: {}", overview.batch);
    let _ = writeln!(output, "- Total students: {}", overview.students.len());
    let _ = writeln!(
        output,
        "- Overall attendance: {}% ({} of {} marks present)",
        overview.overall.percentage, overview.overall.present, overview.overall.total
    );
    let _ = writeln!(
        output,
        "- Good attendance (>= {}%): {}",
        GOOD_ATTENDANCE_THRESHOLD,
        overview.count_with_status(AttendanceStatus::Good)
    );
    let _ = writeln!(
        output,
        "- Poor attendance (< {}%): {}",
        GOOD_ATTENDANCE_THRESHOLD,
        overview.count_with_status(AttendanceStatus::Poor)
    );
    let _ = writeln!(output);

    if overview.students.is_empty() {
        let _ = writeln!(output, "No student attendance available for this batch.");
    } else {
        let _ = writeln!(output, "| Roll | Name | Enrollment | Present | Absent | Total | % | Status |");
        let _ = writeln!(output, "|------|------|------------|---------|--------|-------|---|--------|");
        for row in &overview.students {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} | {}% | {} |",
                row.student.roll_no,
                row.student.name,
                row.student.enrollment_no,
                row.stat.present,
                row.stat.absent,
                row.stat.total,
                row.stat.percentage,
                row.status
            );
        }
    }

    if overview.skipped > 0 {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Skipped {} student(s) whose history could not be fetched: {}",
            overview.skipped,
            overview.skipped_subjects.join(", ")
        );
    }

    output
}

pub fn render_class_history(history: &ClassHistory) -> String {
    let mut output = String::new();

    match history.date {
        Some(date) => {
            let _ = writeln!(output, "## Class Attendance: {} on {}", history.batch, date);
        }
        None => {
            let _ = writeln!(output, "## Class Attendance: {}", history.batch);
        }
    }
    let _ = writeln!(output, "- Total records: {}", history.rows.len());
    let _ = writeln!(output);

    if history.rows.is_empty() {
        let _ = writeln!(output, "No attendance recorded for this batch.");
    } else {
        let _ = writeln!(output, "| Date | Roll | Name | Enrollment | Status |");
        let _ = writeln!(output, "|------|------|------|------------|--------|");
        for row in &history.rows {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} |",
                row.date,
                row.student.roll_no,
                row.student.name,
                row.student.enrollment_no,
                row.status_label()
            );
        }
    }

    if !history.skipped_subjects.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Skipped {} student(s) whose history could not be fetched: {}",
            history.skipped_subjects.len(),
            history.skipped_subjects.join(", ")
        );
    }

    output
}

pub fn render_absent_today(absent: &AbsentToday) -> String {
    let mut output = String::new();

    let scope = absent.branch.as_deref().unwrap_or("all branches");
    let _ = writeln!(output, "## Absent on {} ({})", absent.date, scope);

    if absent.students.is_empty() {
        let _ = writeln!(output, "No absent students.");
    } else {
        for student in &absent.students {
            let _ = writeln!(
                output,
                "- {} {} ({}, {})",
                student.roll_no, student.name, student.enrollment_no, student.batch
            );
        }
    }

    if !absent.skipped_subjects.is_empty() {
        let _ = writeln!(
            output,
            "Skipped {} student(s) whose history could not be fetched: {}",
            absent.skipped_subjects.len(),
            absent.skipped_subjects.join(", ")
        );
    }

    output
}

pub fn render_trend(trend: &BatchTrend) -> String {
    let mut output = String::new();

    if trend.series.is_empty() {
        let _ = writeln!(output, "No attendance recorded for this window.");
        return output;
    }

    for (label, value) in trend.series.labels.iter().zip(&trend.series.values) {
        match value {
            Some(percentage) => {
                let _ = writeln!(output, "- {label}: {percentage}%");
            }
            None => {
                let _ = writeln!(output, "- {label}: no data");
            }
        }
    }

    output
}

pub fn build_report(
    overview: &BatchOverview,
    weekly: &BatchTrend,
    daily: &BatchTrend,
    today: NaiveDate,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Batch Attendance Report");
    let _ = writeln!(output, "Generated for {} on {}", overview.batch, today);
    let _ = writeln!(output);
    output.push_str(&render_overview(overview));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Trend (week of month)");
    output.push_str(&render_trend(weekly));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Trend (last {} days)", daily.series.len());
    output.push_str(&render_trend(daily));

    output
}

const OVERVIEW_CSV_HEADER: [&str; 10] = [
    "enrollment_no",
    "name",
    "roll_no",
    "branch",
    "batch",
    "total",
    "present",
    "absent",
    "percentage",
    "status",
];

#[derive(Debug, Serialize)]
struct OverviewCsvRow<'a> {
    enrollment_no: &'a str,
    name: &'a str,
    roll_no: &'a str,
    branch: &'a str,
    batch: &'a str,
    total: usize,
    present: usize,
    absent: usize,
    percentage: u32,
    status: String,
}

pub fn write_overview_csv<W: std::io::Write>(writer: W, overview: &BatchOverview) -> anyhow::Result<()> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    csv_writer.write_record(OVERVIEW_CSV_HEADER)?;

    for row in &overview.students {
        csv_writer.serialize(OverviewCsvRow {
            enrollment_no: &row.student.enrollment_no,
            name: &row.student.name,
            roll_no: &row.student.roll_no,
            branch: &row.student.branch,
            batch: &row.student.batch,
            total: row.stat.total,
            present: row.stat.present,
            absent: row.stat.absent,
            percentage: row.stat.percentage,
            status: row.status.to_string(),
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceSubmission;
    use crate::store::InMemoryStore;

    const S1: &str = "12345678901234";
    const S2: &str = "12345678901235";

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn options() -> ReportOptions {
        ReportOptions {
            today: date(5),
            window_days: 5,
            concurrency: 4,
        }
    }

    async fn sample_batch() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (enrollment_no, roll_no, name) in [(S1, "101", "John Doe"), (S2, "102", "Jane Smith")] {
            store.add_student(Student {
                enrollment_no: enrollment_no.to_string(),
                name: name.to_string(),
                roll_no: roll_no.to_string(),
                branch: "Computer Science".to_string(),
                batch: "CS2023".to_string(),
            });
        }
        let marks: Vec<_> = [true, false, true, false, true]
            .iter()
            .enumerate()
            .map(|(i, present)| AttendanceSubmission::new(S1, date(i as u32 + 1), *present))
            .collect();
        store.submit_attendance(&marks).await.unwrap();
        store
    }

    #[test]
    fn threshold_boundary_is_inclusive_on_good_side() {
        assert_eq!(AttendanceStatus::from_percentage(70), AttendanceStatus::Good);
        assert_eq!(AttendanceStatus::from_percentage(69), AttendanceStatus::Poor);
        assert_eq!(AttendanceStatus::from_percentage(100), AttendanceStatus::Good);
        assert_eq!(AttendanceStatus::from_percentage(0), AttendanceStatus::Poor);
        assert_eq!(AttendanceStatus::Good.to_string(), "Good");
    }

    #[tokio::test]
    async fn overview_keeps_students_without_records() {
        let store = sample_batch().await;
        let overview = compute_batch_overview(&store, "CS2023", 8).await.unwrap();

        assert_eq!(overview.students.len(), 2);
        assert_eq!(overview.skipped, 0);

        let s1 = &overview.students[0];
        assert_eq!(s1.stat.subject_id, S1);
        assert_eq!(s1.stat.total, 5);
        assert_eq!(s1.stat.present, 3);
        assert_eq!(s1.stat.percentage, 60);
        assert_eq!(s1.status, AttendanceStatus::Poor);

        let s2 = &overview.students[1];
        assert_eq!(s2.stat.total, 0);
        assert_eq!(s2.stat.percentage, 0);

        assert_eq!(overview.overall.total, 5);
        assert_eq!(overview.overall.percentage, 60);
    }

    #[tokio::test]
    async fn overview_survives_partial_fetch_failure() {
        let store = sample_batch().await;
        store.fail_history_for(S2);

        let overview = compute_batch_overview(&store, "CS2023", 8).await.unwrap();
        assert_eq!(overview.skipped, 1);
        assert_eq!(overview.skipped_subjects, vec![S2]);
        assert_eq!(overview.students.len(), 1);
        assert_eq!(overview.students[0].stat.percentage, 60);

        let rendered = render_overview(&overview);
        assert!(rendered.contains("Skipped 1 student(s)"));
        assert!(rendered.contains(S2));
    }

    #[tokio::test]
    async fn student_summary_reads_one_history() {
        let store = sample_batch().await;
        let stat = compute_student_summary(&store, S1).await.unwrap();
        assert_eq!((stat.total, stat.present, stat.absent, stat.percentage), (5, 3, 2, 60));

        let empty = compute_student_summary(&store, S2).await.unwrap();
        assert_eq!(empty.percentage, 0);
    }

    #[tokio::test]
    async fn summary_surfaces_store_outage() {
        let store = sample_batch().await;
        store.set_unavailable(true);
        let err = compute_student_summary(&store, S1).await.unwrap_err();
        assert!(matches!(err, ReportError::CollaboratorUnavailable { .. }));
    }

    #[tokio::test]
    async fn snapshot_includes_todays_mark() {
        let store = sample_batch().await;
        let snapshot = compute_student_snapshot(&store, S1, date(5)).await.unwrap();
        assert_eq!(snapshot.today.map(|r| r.present), Some(1));

        let missing = compute_student_snapshot(&store, S1, date(9)).await.unwrap();
        assert!(missing.today.is_none());
    }

    #[tokio::test]
    async fn faculty_summary_uses_faculty_history() {
        let store = InMemoryStore::new();
        store
            .submit_faculty_attendance(&[
                AttendanceSubmission::new("robert.johnson@university.edu", date(1), true),
                AttendanceSubmission::new("robert.johnson@university.edu", date(2), true),
                AttendanceSubmission::new("robert.johnson@university.edu", date(3), false),
            ])
            .await
            .unwrap();

        let stat = compute_faculty_summary(&store, "robert.johnson@university.edu")
            .await
            .unwrap();
        assert_eq!(stat.total, 3);
        assert_eq!(stat.percentage, 67);
    }

    #[tokio::test]
    async fn batch_trend_rejects_unknown_mode() {
        let store = sample_batch().await;
        let err = compute_batch_trend(&store, "CS2023", "hourly", &options())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::InvalidBucketMode(_)));
    }

    #[tokio::test]
    async fn daily_batch_trend_covers_window() {
        let store = sample_batch().await;
        let trend = compute_batch_trend(&store, "CS2023", "daily", &options())
            .await
            .unwrap();
        assert_eq!(trend.mode, "daily");
        assert_eq!(
            trend.series.values,
            vec![Some(100), Some(0), Some(100), Some(0), Some(100)]
        );
    }

    #[tokio::test]
    async fn weekly_batch_trend_uses_week_labels() {
        let store = sample_batch().await;
        let trend = compute_batch_trend(&store, "CS2023", "weekly", &options())
            .await
            .unwrap();
        // March 2025 starts on a Saturday: the 1st is week 1, the 2nd-5th week 2.
        assert_eq!(trend.series.labels, vec!["Week 1", "Week 2"]);
        assert_eq!(trend.series.values, vec![Some(100), Some(50)]);
    }

    #[tokio::test]
    async fn full_report_contains_every_section() {
        let store = sample_batch().await;
        let report = compute_batch_report(&store, "CS2023", &options()).await.unwrap();

        assert!(report.contains("# Batch Attendance Report"));
        assert!(report.contains("| 101 | John Doe | 12345678901234 | 3 | 2 | 5 | 60% | Poor |"));
        assert!(report.contains("## Weekly Trend"));
        assert!(report.contains("## Daily Trend (last 5 days)"));
        assert!(report.contains("- 2025-03-02: 0%"));
    }

    #[tokio::test]
    async fn csv_export_has_one_row_per_student() {
        let store = sample_batch().await;
        let overview = compute_batch_overview(&store, "CS2023", 2).await.unwrap();

        let mut buffer = Vec::new();
        write_overview_csv(&mut buffer, &overview).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("enrollment_no,name,roll_no"));
        assert!(lines[1].ends_with(",5,3,2,60,Poor"));
    }

    #[tokio::test]
    async fn csv_export_of_empty_batch_still_has_header() {
        let store = InMemoryStore::new();
        let overview = compute_batch_overview(&store, "ME2024", 2).await.unwrap();

        let mut buffer = Vec::new();
        write_overview_csv(&mut buffer, &overview).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert_eq!(
            text,
            "enrollment_no,name,roll_no,branch,batch,total,present,absent,percentage,status\n"
        );
    }

    #[tokio::test]
    async fn class_history_is_newest_first_then_by_roll() {
        let store = sample_batch().await;
        store
            .submit_attendance(&[AttendanceSubmission::new(S2, date(5), false)])
            .await
            .unwrap();

        let history = compute_class_history(&store, "CS2023", None, 4).await.unwrap();
        assert_eq!(history.rows.len(), 6);
        let first: Vec<_> = history.rows[..2]
            .iter()
            .map(|row| (row.date, row.student.roll_no.as_str(), row.status_label()))
            .collect();
        assert_eq!(first, vec![(date(5), "101", "Present"), (date(5), "102", "Absent")]);
        assert_eq!(history.rows.last().unwrap().date, date(1));

        let rendered = render_class_history(&history);
        assert!(rendered.contains("| 2025-03-05 | 102 | Jane Smith | 12345678901235 | Absent |"));
    }

    #[tokio::test]
    async fn class_history_filters_to_one_day() {
        let store = sample_batch().await;
        let history = compute_class_history(&store, "CS2023", Some(date(2)), 4)
            .await
            .unwrap();
        assert_eq!(history.rows.len(), 1);
        assert_eq!(history.rows[0].student.enrollment_no, S1);
        assert!(!history.rows[0].present);

        let empty = compute_class_history(&store, "CS2023", Some(date(20)), 4)
            .await
            .unwrap();
        assert!(empty.rows.is_empty());
        assert!(render_class_history(&empty).contains("No attendance recorded for this batch."));
    }

    #[tokio::test]
    async fn absent_today_lists_students_without_a_present_mark() {
        let store = sample_batch().await;
        store.add_student(Student {
            enrollment_no: "12345678902001".to_string(),
            name: "Alice Brown".to_string(),
            roll_no: "201".to_string(),
            branch: "Electrical".to_string(),
            batch: "EE2023".to_string(),
        });

        // S1 is present on the 5th, S2 has no mark, the EE student has none either.
        let all = compute_absent_today(&store, None, date(5), 4).await.unwrap();
        let ids: Vec<_> = all.students.iter().map(|s| s.enrollment_no.as_str()).collect();
        assert_eq!(ids, vec![S2, "12345678902001"]);

        let cs = compute_absent_today(&store, Some("Computer Science"), date(5), 4)
            .await
            .unwrap();
        assert_eq!(cs.students.len(), 1);
        assert_eq!(cs.students[0].enrollment_no, S2);

        // On the 4th S1 was marked absent.
        let earlier = compute_absent_today(&store, Some("Computer Science"), date(4), 4)
            .await
            .unwrap();
        assert_eq!(earlier.students.len(), 2);
        assert!(render_absent_today(&earlier).contains("(Computer Science)"));
    }

    #[tokio::test]
    async fn absent_today_does_not_count_unfetched_students() {
        let store = sample_batch().await;
        store.fail_history_for(S2);

        let absent = compute_absent_today(&store, None, date(5), 4).await.unwrap();
        assert!(absent.students.is_empty());
        assert_eq!(absent.skipped_subjects, vec![S2]);
    }

    #[tokio::test]
    async fn timeout_is_reported_as_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, ReportError>(())
        };
        let err = with_timeout(Duration::from_millis(10), slow).await.unwrap_err();
        assert!(matches!(err, ReportError::TimedOut(_)));
    }
}
