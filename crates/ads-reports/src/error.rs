//! Error types for ads-reports.

use adkit_ads_client::ErrorCategory;

use crate::types::JobStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    pub kind: ErrorKind,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Failure class; client errors keep the class of the underlying API failure.
    pub fn category(&self) -> ErrorCategory {
        match &self.kind {
            ErrorKind::Client(_) => self
                .source
                .as_deref()
                .and_then(|s| s.downcast_ref::<adkit_ads_client::Error>())
                .map(adkit_ads_client::Error::category)
                .unwrap_or(ErrorCategory::Other),
            ErrorKind::QueueCorruption(_) => ErrorCategory::QueueCorruption,
            ErrorKind::JobNotFound(_) => ErrorCategory::NotFound,
            ErrorKind::InvalidState { .. } | ErrorKind::InvalidRequest(_) => ErrorCategory::Validation,
            ErrorKind::UnknownStatus(_) | ErrorKind::Download(_) | ErrorKind::Io(_) | ErrorKind::Json(_) => {
                ErrorCategory::Other
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("{0}")]
    Client(String),
    #[error("Report queue is corrupted: {0}")]
    QueueCorruption(String),
    #[error("Report {0} is not in the queue")]
    JobNotFound(String),
    #[error("Report {job_id} is {status}, expected {expected}")]
    InvalidState {
        job_id: String,
        status: JobStatus,
        expected: JobStatus,
    },
    #[error("Invalid report request: {0}")]
    InvalidRequest(String),
    #[error("Unknown remote report status '{0}'")]
    UnknownStatus(String),
    #[error("Download failed: {0}")]
    Download(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<adkit_ads_client::Error> for Error {
    fn from(err: adkit_ads_client::Error) -> Self {
        Error::with_source(ErrorKind::Client(err.to_string()), err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Io(err.to_string()), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_keeps_category() {
        let client_err = adkit_ads_client::Error::new(adkit_ads_client::ErrorKind::RateLimited {
            retry_after: None,
            attempts: 3,
        });
        let err: Error = client_err.into();
        assert_eq!(err.category(), ErrorCategory::RateLimit);
        assert_eq!(err.category().exit_code(), 4);
    }

    #[test]
    fn test_queue_categories() {
        let err = Error::new(ErrorKind::QueueCorruption("bad json".into()));
        assert_eq!(err.category().tag(), "QUEUE_CORRUPTION");

        let err = Error::new(ErrorKind::JobNotFound("abc".into()));
        assert_eq!(err.category().tag(), "NOT_FOUND");

        let err = Error::new(ErrorKind::InvalidState {
            job_id: "abc".into(),
            status: JobStatus::Processing,
            expected: JobStatus::Completed,
        });
        assert_eq!(err.to_string(), "Report abc is PROCESSING, expected COMPLETED");
        assert_eq!(err.category().tag(), "VALIDATION_ERROR");
    }
}
