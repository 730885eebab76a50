use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::report::AttendanceStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub enrollment_no: String,
    pub name: String,
    pub roll_no: String,
    pub branch: String,
    pub batch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faculty {
    pub email: String,
    pub name: String,
    pub phone: String,
}

/// One subject's attendance on one calendar day.
///
/// `subject_id` is the enrollment number for students and the email for
/// faculty. Stores may return it empty when the history was fetched by
/// subject; the coordinator fills it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub subject_id: String,
    pub date: NaiveDate,
    pub present: i32,
}

impl AttendanceRecord {
    pub fn new(subject_id: impl Into<String>, date: NaiveDate, present: bool) -> Self {
        Self {
            subject_id: subject_id.into(),
            date,
            present: i32::from(present),
        }
    }

    pub fn is_present(&self) -> bool {
        self.present == 1
    }
}

/// Typed write payload for a single (subject, date) mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSubmission {
    pub subject_id: String,
    pub date: NaiveDate,
    pub present: i32,
}

impl AttendanceSubmission {
    pub fn new(subject_id: impl Into<String>, date: NaiveDate, present: bool) -> Self {
        Self {
            subject_id: subject_id.into(),
            date,
            present: i32::from(present),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateStat {
    pub subject_id: String,
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub label: String,
    pub present: usize,
    pub total: usize,
    pub percentage: Option<u32>,
}

/// Parallel label/value series consumed by charts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrendSeries {
    pub labels: Vec<String>,
    pub values: Vec<Option<u32>>,
}

impl TrendSeries {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchTrend {
    pub batch: String,
    pub mode: String,
    pub series: TrendSeries,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentOverview {
    pub student: Student,
    pub stat: AggregateStat,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOverview {
    pub batch: String,
    /// Pooled over every fetched record in the batch.
    pub overall: AggregateStat,
    pub students: Vec<StudentOverview>,
    pub skipped: usize,
    pub skipped_subjects: Vec<String>,
}

impl BatchOverview {
    pub fn count_with_status(&self, status: AttendanceStatus) -> usize {
        self.students.iter().filter(|row| row.status == status).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentSnapshot {
    pub stat: AggregateStat,
    pub status: AttendanceStatus,
    pub today: Option<AttendanceRecord>,
}

/// One student's mark on one day, as listed in a batch's history.
#[derive(Debug, Clone, Serialize)]
pub struct ClassHistoryRow {
    pub student: Student,
    pub date: NaiveDate,
    pub present: bool,
}

impl ClassHistoryRow {
    pub fn status_label(&self) -> &'static str {
        if self.present {
            "Present"
        } else {
            "Absent"
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassHistory {
    pub batch: String,
    pub date: Option<NaiveDate>,
    /// Newest day first, then by roll number.
    pub rows: Vec<ClassHistoryRow>,
    pub skipped_subjects: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbsentToday {
    pub date: NaiveDate,
    pub branch: Option<String>,
    pub students: Vec<Student>,
    pub skipped_subjects: Vec<String>,
}
