use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

use crate::error::ReportError;
use crate::models::{AttendanceRecord, AttendanceSubmission, Faculty, Student};

pub const ENROLLMENT_NO_LEN: usize = 14;

/// Read/write access to the attendance record store.
///
/// Every method reports an unreachable store as
/// [`ReportError::CollaboratorUnavailable`]; an empty `Vec` always means
/// "nothing recorded".
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Distinct batch labels, sorted.
    async fn list_batches(&self) -> Result<Vec<String>, ReportError>;

    async fn list_students(&self, batch: &str) -> Result<Vec<Student>, ReportError>;

    async fn attendance_history(&self, subject_id: &str) -> Result<Vec<AttendanceRecord>, ReportError>;

    async fn faculty_attendance_history(&self, email: &str) -> Result<Vec<AttendanceRecord>, ReportError>;

    /// Upserts student marks and returns how many were written.
    async fn submit_attendance(&self, submissions: &[AttendanceSubmission]) -> Result<usize, ReportError>;

    async fn submit_faculty_attendance(
        &self,
        submissions: &[AttendanceSubmission],
    ) -> Result<usize, ReportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    Student,
    Faculty,
}

pub fn is_valid_enrollment_no(value: &str) -> bool {
    value.len() == ENROLLMENT_NO_LEN && value.bytes().all(|b| b.is_ascii_digit())
}

/// Checks a submission payload before anything is written.
///
/// A (subject, date) already in the store is overwritten by the write that
/// follows; the same pair twice in one payload is rejected.
pub fn validate_submissions(
    kind: SubjectKind,
    submissions: &[AttendanceSubmission],
) -> Result<(), ReportError> {
    let mut seen = HashSet::new();

    for submission in submissions {
        match kind {
            SubjectKind::Student if !is_valid_enrollment_no(&submission.subject_id) => {
                return Err(ReportError::InvalidSubmission(format!(
                    "enrollment number '{}' must be exactly {ENROLLMENT_NO_LEN} digits",
                    submission.subject_id
                )));
            }
            SubjectKind::Faculty if !submission.subject_id.contains('@') => {
                return Err(ReportError::InvalidSubmission(format!(
                    "faculty email '{}' is not an email address",
                    submission.subject_id
                )));
            }
            _ => {}
        }

        if !matches!(submission.present, 0 | 1) {
            return Err(ReportError::InvalidSubmission(format!(
                "present must be 0 or 1 for {} on {}, got {}",
                submission.subject_id, submission.date, submission.present
            )));
        }

        if !seen.insert((submission.subject_id.as_str(), submission.date)) {
            return Err(ReportError::DuplicateSubmission {
                subject_id: submission.subject_id.clone(),
                date: submission.date,
            });
        }
    }

    Ok(())
}

#[derive(Debug, Default)]
struct MemoryState {
    students: Vec<Student>,
    student_marks: BTreeMap<(String, NaiveDate), i32>,
    faculty_marks: BTreeMap<(String, NaiveDate), i32>,
    unavailable: bool,
    failing_subjects: HashSet<String>,
}

/// Store kept entirely in process memory, used for `--demo` runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_data(today: NaiveDate) -> Self {
        let store = Self::new();
        let sample = SampleData::generate(today);
        {
            let mut state = store.lock();
            state.students = sample.students;
            for mark in sample.student_marks {
                state.student_marks.insert((mark.subject_id, mark.date), mark.present);
            }
            for mark in sample.faculty_marks {
                state.faculty_marks.insert((mark.subject_id, mark.date), mark.present);
            }
        }
        store
    }

    #[cfg(test)]
    pub fn add_student(&self, student: Student) {
        self.lock().students.push(student);
    }

    #[cfg(test)]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    #[cfg(test)]
    pub fn fail_history_for(&self, subject_id: &str) {
        self.lock().failing_subjects.insert(subject_id.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(state: &MemoryState, operation: &'static str) -> Result<(), ReportError> {
        if state.unavailable {
            return Err(ReportError::unavailable(
                operation,
                anyhow::anyhow!("in-memory store marked offline"),
            ));
        }
        Ok(())
    }
}

fn history(marks: &BTreeMap<(String, NaiveDate), i32>, subject_id: &str) -> Vec<AttendanceRecord> {
    // Most recent first, as the history endpoints return it.
    marks
        .iter()
        .filter(|((subject, _), _)| subject == subject_id)
        .rev()
        .map(|((subject, date), present)| AttendanceRecord::new(subject.clone(), *date, *present == 1))
        .collect()
}

#[async_trait]
impl AttendanceStore for InMemoryStore {
    async fn list_batches(&self) -> Result<Vec<String>, ReportError> {
        let state = self.lock();
        Self::check_available(&state, "list_batches")?;
        let batches: BTreeSet<String> = state.students.iter().map(|s| s.batch.clone()).collect();
        Ok(batches.into_iter().collect())
    }

    async fn list_students(&self, batch: &str) -> Result<Vec<Student>, ReportError> {
        let state = self.lock();
        Self::check_available(&state, "list_students")?;
        let mut students: Vec<Student> = state
            .students
            .iter()
            .filter(|s| s.batch == batch)
            .cloned()
            .collect();
        students.sort_by(|a, b| a.roll_no.cmp(&b.roll_no));
        Ok(students)
    }

    async fn attendance_history(&self, subject_id: &str) -> Result<Vec<AttendanceRecord>, ReportError> {
        let state = self.lock();
        Self::check_available(&state, "attendance_history")?;
        if state.failing_subjects.contains(subject_id) {
            return Err(ReportError::unavailable(
                "attendance_history",
                anyhow::anyhow!("history lookup failed for {subject_id}"),
            ));
        }
        Ok(history(&state.student_marks, subject_id))
    }

    async fn faculty_attendance_history(&self, email: &str) -> Result<Vec<AttendanceRecord>, ReportError> {
        let state = self.lock();
        Self::check_available(&state, "faculty_attendance_history")?;
        Ok(history(&state.faculty_marks, email))
    }

    async fn submit_attendance(&self, submissions: &[AttendanceSubmission]) -> Result<usize, ReportError> {
        validate_submissions(SubjectKind::Student, submissions)?;
        let mut state = self.lock();
        Self::check_available(&state, "submit_attendance")?;
        for submission in submissions {
            state
                .student_marks
                .insert((submission.subject_id.clone(), submission.date), submission.present);
        }
        Ok(submissions.len())
    }

    async fn submit_faculty_attendance(
        &self,
        submissions: &[AttendanceSubmission],
    ) -> Result<usize, ReportError> {
        validate_submissions(SubjectKind::Faculty, submissions)?;
        let mut state = self.lock();
        Self::check_available(&state, "submit_faculty_attendance")?;
        for submission in submissions {
            state
                .faculty_marks
                .insert((submission.subject_id.clone(), submission.date), submission.present);
        }
        Ok(submissions.len())
    }
}

/// Deterministic sample roster and ten days of marks ending at `today`.
#[derive(Debug, Clone)]
pub struct SampleData {
    pub students: Vec<Student>,
    pub faculty: Vec<Faculty>,
    pub student_marks: Vec<AttendanceSubmission>,
    pub faculty_marks: Vec<AttendanceSubmission>,
}

impl SampleData {
    pub fn generate(today: NaiveDate) -> Self {
        let roster = [
            ("John Doe", "101", "12345678901234", "Computer Science", "CS2023", 7),
            ("Jane Smith", "102", "12345678901235", "Computer Science", "CS2023", 5),
            ("Mike Johnson", "103", "12345678901236", "Computer Science", "CS2023", 3),
            ("Sarah Wilson", "201", "12345678901237", "Electrical", "EE2023", 3),
            ("David Brown", "202", "12345678901238", "Electrical", "EE2023", 2),
        ];
        let students: Vec<Student> = roster
            .iter()
            .map(|(name, roll_no, enrollment_no, branch, batch, _)| Student {
                enrollment_no: enrollment_no.to_string(),
                name: name.to_string(),
                roll_no: roll_no.to_string(),
                branch: branch.to_string(),
                batch: batch.to_string(),
            })
            .collect();

        let faculty = vec![
            Faculty {
                email: "robert.johnson@university.edu".to_string(),
                name: "Dr. Robert Johnson".to_string(),
                phone: "9876543210".to_string(),
            },
            Faculty {
                email: "mary.williams@university.edu".to_string(),
                name: "Prof. Mary Williams".to_string(),
                phone: "9876543211".to_string(),
            },
        ];

        let mut student_marks = Vec::new();
        for (index, (student, entry)) in students.iter().zip(roster.iter()).enumerate() {
            // Absent whenever (days_ago + index) is a multiple of the roster's cadence.
            let miss_every: usize = entry.5;
            for days_ago in 0..10usize {
                let date = today - Duration::days(days_ago as i64);
                let present = (days_ago + index) % miss_every != 0;
                student_marks.push(AttendanceSubmission::new(&student.enrollment_no, date, present));
            }
        }

        let mut faculty_marks = Vec::new();
        for (index, member) in faculty.iter().enumerate() {
            for days_ago in 0..10usize {
                let date = today - Duration::days(days_ago as i64);
                let present = days_ago != 3 + index;
                faculty_marks.push(AttendanceSubmission::new(&member.email, date, present));
            }
        }

        Self {
            students,
            faculty,
            student_marks,
            faculty_marks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn student(enrollment_no: &str, roll_no: &str, batch: &str) -> Student {
        Student {
            enrollment_no: enrollment_no.to_string(),
            name: format!("Student {roll_no}"),
            roll_no: roll_no.to_string(),
            branch: "Computer Science".to_string(),
            batch: batch.to_string(),
        }
    }

    #[test]
    fn enrollment_numbers_must_be_fourteen_digits() {
        assert!(is_valid_enrollment_no("12345678901234"));
        assert!(!is_valid_enrollment_no("1234567890123"));
        assert!(!is_valid_enrollment_no("1234567890123a"));
    }

    #[test]
    fn duplicate_pair_in_one_payload_is_rejected() {
        let payload = vec![
            AttendanceSubmission::new("12345678901234", date(1), true),
            AttendanceSubmission::new("12345678901234", date(1), false),
        ];
        let err = validate_submissions(SubjectKind::Student, &payload).unwrap_err();
        assert!(matches!(err, ReportError::DuplicateSubmission { ref subject_id, date: d }
            if subject_id == "12345678901234" && d == date(1)));
    }

    #[test]
    fn present_outside_zero_one_is_rejected() {
        let mut submission = AttendanceSubmission::new("12345678901234", date(1), true);
        submission.present = 3;
        let err = validate_submissions(SubjectKind::Student, &[submission]).unwrap_err();
        assert!(matches!(err, ReportError::InvalidSubmission(_)));
    }

    #[test]
    fn faculty_submissions_are_keyed_by_email() {
        let ok = [AttendanceSubmission::new("a@uni.edu", date(1), true)];
        assert!(validate_submissions(SubjectKind::Faculty, &ok).is_ok());
        let bad = [AttendanceSubmission::new("12345678901234", date(1), true)];
        assert!(validate_submissions(SubjectKind::Faculty, &bad).is_err());
    }

    #[tokio::test]
    async fn resubmission_overwrites_instead_of_adding() {
        let store = InMemoryStore::new();
        store
            .submit_attendance(&[AttendanceSubmission::new("12345678901234", date(1), true)])
            .await
            .unwrap();
        store
            .submit_attendance(&[AttendanceSubmission::new("12345678901234", date(1), false)])
            .await
            .unwrap();

        let history = store.attendance_history("12345678901234").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].present, 0);
    }

    #[tokio::test]
    async fn rejected_payload_writes_nothing() {
        let store = InMemoryStore::new();
        let payload = vec![
            AttendanceSubmission::new("12345678901234", date(2), true),
            AttendanceSubmission::new("12345678901234", date(2), true),
        ];
        assert!(store.submit_attendance(&payload).await.is_err());
        assert!(store.attendance_history("12345678901234").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batches_are_distinct_and_sorted() {
        let store = InMemoryStore::new();
        store.add_student(student("12345678901236", "3", "EE2023"));
        store.add_student(student("12345678901234", "1", "CS2023"));
        store.add_student(student("12345678901235", "2", "CS2023"));

        assert_eq!(store.list_batches().await.unwrap(), vec!["CS2023", "EE2023"]);
        let students = store.list_students("CS2023").await.unwrap();
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].roll_no, "1");
    }

    #[tokio::test]
    async fn offline_store_is_an_error_not_an_empty_result() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        let err = store.list_students("CS2023").await.unwrap_err();
        assert!(matches!(err, ReportError::CollaboratorUnavailable { operation: "list_students", .. }));
    }

    #[test]
    fn sample_data_has_ten_days_per_subject() {
        let sample = SampleData::generate(date(20));
        assert_eq!(sample.students.len(), 5);
        assert_eq!(sample.student_marks.len(), 50);
        assert_eq!(sample.faculty_marks.len(), 20);
        assert!(validate_submissions(SubjectKind::Student, &sample.student_marks).is_ok());
        assert!(validate_submissions(SubjectKind::Faculty, &sample.faculty_marks).is_ok());
    }
}
