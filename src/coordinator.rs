use futures::stream::{self, StreamExt};

use crate::config::clamp_concurrency;
use crate::error::ReportError;
use crate::models::{AttendanceRecord, Student};
use crate::store::AttendanceStore;

#[derive(Debug, Clone)]
pub struct StudentRecords {
    pub student: Student,
    pub records: Vec<AttendanceRecord>,
}

/// Everything fetched for a batch. Students whose history could not be
/// fetched are left out of `students` and listed in `skipped_subjects`.
#[derive(Debug, Clone, Default)]
pub struct BatchRecords {
    pub batch: String,
    pub students: Vec<StudentRecords>,
    pub skipped_subjects: Vec<String>,
}

impl BatchRecords {
    pub fn skipped(&self) -> usize {
        self.skipped_subjects.len()
    }

    pub fn flatten(&self) -> Vec<AttendanceRecord> {
        self.students
            .iter()
            .flat_map(|entry| entry.records.iter().cloned())
            .collect()
    }
}

/// Fetches the roster of `batch` and every student's history, keeping at
/// most `concurrency` history lookups in flight.
///
/// Failing to list the roster fails the call. A failed history lookup only
/// drops that student. Dropping the returned future abandons every
/// in-flight lookup.
pub async fn fetch_batch(
    store: &dyn AttendanceStore,
    batch: &str,
    concurrency: usize,
) -> Result<BatchRecords, ReportError> {
    let students = store.list_students(batch).await?;
    if students.is_empty() {
        tracing::info!(batch, "batch has no enrolled students");
        return Ok(BatchRecords {
            batch: batch.to_string(),
            ..Default::default()
        });
    }

    let mut slots: Vec<Option<Result<Vec<AttendanceRecord>, ReportError>>> =
        (0..students.len()).map(|_| None).collect();

    let mut fetches = stream::iter(students.iter().enumerate())
        .map(|(index, student)| async move {
            (index, store.attendance_history(&student.enrollment_no).await)
        })
        .buffer_unordered(clamp_concurrency(concurrency));

    while let Some((index, result)) = fetches.next().await {
        slots[index] = Some(result);
    }
    drop(fetches);

    let mut fetched = BatchRecords {
        batch: batch.to_string(),
        ..Default::default()
    };

    for (student, slot) in students.into_iter().zip(slots) {
        match slot {
            Some(Ok(mut records)) => {
                for record in records.iter_mut() {
                    if record.subject_id.is_empty() {
                        record.subject_id = student.enrollment_no.clone();
                    }
                }
                fetched.students.push(StudentRecords { student, records });
            }
            Some(Err(err)) => {
                tracing::warn!(
                    batch,
                    enrollment_no = %student.enrollment_no,
                    error = %err,
                    "skipping student whose history could not be fetched"
                );
                fetched.skipped_subjects.push(student.enrollment_no);
            }
            None => fetched.skipped_subjects.push(student.enrollment_no),
        }
    }

    tracing::debug!(
        batch,
        students = fetched.students.len(),
        skipped = fetched.skipped(),
        "batch attendance fetched"
    );
    Ok(fetched)
}
