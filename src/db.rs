use std::io::Read;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::error::ReportError;
use crate::models::{AttendanceRecord, AttendanceSubmission, Student};
use crate::store::{validate_submissions, AttendanceStore, SampleData, SubjectKind};

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Loads the sample roster and marks. Re-running refreshes names and
/// overwrites marks for the same days.
pub async fn seed(pool: &PgPool, today: NaiveDate) -> anyhow::Result<usize> {
    let sample = SampleData::generate(today);

    for student in &sample.students {
        sqlx::query(
            r#"
            INSERT INTO attendance_insights.students
            (enrollment_no, full_name, roll_no, branch, batch)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (enrollment_no) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                roll_no = EXCLUDED.roll_no,
                branch = EXCLUDED.branch,
                batch = EXCLUDED.batch
            "#,
        )
        .bind(&student.enrollment_no)
        .bind(&student.name)
        .bind(&student.roll_no)
        .bind(&student.branch)
        .bind(&student.batch)
        .execute(pool)
        .await?;
    }

    for member in &sample.faculty {
        sqlx::query(
            r#"
            INSERT INTO attendance_insights.faculty (email, full_name, phone)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, phone = EXCLUDED.phone
            "#,
        )
        .bind(&member.email)
        .bind(&member.name)
        .bind(&member.phone)
        .execute(pool)
        .await?;
    }

    let store = PgAttendanceStore::new(pool.clone());
    let mut written = store.submit_attendance(&sample.student_marks).await?;
    written += store.submit_faculty_attendance(&sample.faculty_marks).await?;
    Ok(written)
}

/// Parses `enrollment_no,date,present` rows into one submission payload.
pub fn parse_attendance_csv<R: Read>(reader: R) -> anyhow::Result<Vec<AttendanceSubmission>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        enrollment_no: String,
        date: NaiveDate,
        present: i32,
    }

    let mut reader = csv::Reader::from_reader(reader);
    let mut submissions = Vec::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid attendance row {}", line + 1))?;
        submissions.push(AttendanceSubmission {
            subject_id: row.enrollment_no.trim().to_string(),
            date: row.date,
            present: row.present,
        });
    }

    Ok(submissions)
}

/// Imports a CSV of student marks through the regular submission path.
pub async fn import_csv(store: &dyn AttendanceStore, csv_path: &Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let submissions = parse_attendance_csv(file)?;
    let written = store.submit_attendance(&submissions).await?;
    Ok(written)
}

pub struct PgAttendanceStore {
    pool: PgPool,
}

impl PgAttendanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_history(
        &self,
        operation: &'static str,
        query: &str,
        subject_id: &str,
    ) -> Result<Vec<AttendanceRecord>, ReportError> {
        let rows = sqlx::query(query)
            .bind(subject_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ReportError::unavailable(operation, e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(AttendanceRecord {
                subject_id: row.get("subject_id"),
                date: row.get("attended_on"),
                present: row.get("present"),
            });
        }
        Ok(records)
    }

    async fn upsert_marks(
        &self,
        operation: &'static str,
        query: &str,
        submissions: &[AttendanceSubmission],
    ) -> Result<usize, ReportError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ReportError::unavailable(operation, e))?;

        for submission in submissions {
            sqlx::query(query)
                .bind(&submission.subject_id)
                .bind(submission.date)
                .bind(submission.present)
                .execute(&mut *tx)
                .await
                .map_err(|e| ReportError::unavailable(operation, e))?;
        }

        tx.commit()
            .await
            .map_err(|e| ReportError::unavailable(operation, e))?;
        tracing::debug!(operation, written = submissions.len(), "attendance marks upserted");
        Ok(submissions.len())
    }
}

#[async_trait]
impl AttendanceStore for PgAttendanceStore {
    async fn list_batches(&self) -> Result<Vec<String>, ReportError> {
        let rows = sqlx::query(
            "SELECT DISTINCT batch FROM attendance_insights.students ORDER BY batch",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ReportError::unavailable("list_batches", e))?;

        Ok(rows.into_iter().map(|row| row.get("batch")).collect())
    }

    async fn list_students(&self, batch: &str) -> Result<Vec<Student>, ReportError> {
        let rows = sqlx::query(
            r#"
            SELECT enrollment_no, full_name, roll_no, branch, batch
            FROM attendance_insights.students
            WHERE batch = $1
            ORDER BY roll_no
            "#,
        )
        .bind(batch)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ReportError::unavailable("list_students", e))?;

        let mut students = Vec::with_capacity(rows.len());
        for row in rows {
            students.push(Student {
                enrollment_no: row.get("enrollment_no"),
                name: row.get("full_name"),
                roll_no: row.get("roll_no"),
                branch: row.get("branch"),
                batch: row.get("batch"),
            });
        }
        Ok(students)
    }

    async fn attendance_history(&self, subject_id: &str) -> Result<Vec<AttendanceRecord>, ReportError> {
        self.fetch_history(
            "attendance_history",
            "SELECT enrollment_no AS subject_id, attended_on, present \
             FROM attendance_insights.student_attendance \
             WHERE enrollment_no = $1 ORDER BY attended_on DESC",
            subject_id,
        )
        .await
    }

    async fn faculty_attendance_history(&self, email: &str) -> Result<Vec<AttendanceRecord>, ReportError> {
        self.fetch_history(
            "faculty_attendance_history",
            "SELECT email AS subject_id, attended_on, present \
             FROM attendance_insights.faculty_attendance \
             WHERE email = $1 ORDER BY attended_on DESC",
            email,
        )
        .await
    }

    async fn submit_attendance(&self, submissions: &[AttendanceSubmission]) -> Result<usize, ReportError> {
        validate_submissions(SubjectKind::Student, submissions)?;
        self.upsert_marks(
            "submit_attendance",
            r#"
            INSERT INTO attendance_insights.student_attendance (enrollment_no, attended_on, present)
            VALUES ($1, $2, $3)
            ON CONFLICT (enrollment_no, attended_on) DO UPDATE
            SET present = EXCLUDED.present, recorded_at = now()
            "#,
            submissions,
        )
        .await
    }

    async fn submit_faculty_attendance(
        &self,
        submissions: &[AttendanceSubmission],
    ) -> Result<usize, ReportError> {
        validate_submissions(SubjectKind::Faculty, submissions)?;
        self.upsert_marks(
            "submit_faculty_attendance",
            r#"
            INSERT INTO attendance_insights.faculty_attendance (email, attended_on, present)
            VALUES ($1, $2, $3)
            ON CONFLICT (email, attended_on) DO UPDATE
            SET present = EXCLUDED.present, recorded_at = now()
            "#,
            submissions,
        )
        .await
    }
}
