use std::time::Duration;

use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("attendance store unavailable during {operation}: {source}")]
    CollaboratorUnavailable {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid bucket mode '{0}' (expected 'weekly' or 'daily')")]
    InvalidBucketMode(String),

    #[error("duplicate attendance for {subject_id} on {date} in one submission")]
    DuplicateSubmission { subject_id: String, date: NaiveDate },

    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("report timed out after {0:?}")]
    TimedOut(Duration),
}

impl ReportError {
    pub fn unavailable(operation: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::CollaboratorUnavailable {
            operation,
            source: source.into(),
        }
    }
}
