use thiserror::Error;

use crate::domain::JobId;

/// Errors surfaced by the core operations.
///
/// - `QueueClosed` / `BrokerClosed` は呼び出し側に同期的に返す（リトライ不可）
/// - `HandlerFault` は worker 内で閉じ込めてログに出すだけ（submitter には届かない）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CourierError {
    #[error("job queue is closed")]
    QueueClosed,

    #[error("broker is closed")]
    BrokerClosed,

    #[error("handler fault on {job_id}: {reason}")]
    HandlerFault { job_id: JobId, reason: String },
}

/// The error a [`JobHandler`](crate::runtime::JobHandler) returns for one job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_fault_names_the_job() {
        let err = CourierError::HandlerFault {
            job_id: JobId::new(7),
            reason: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "handler fault on job-7: boom");
    }

    #[test]
    fn handler_error_converts_from_strings() {
        let a: HandlerError = "bad payload".into();
        let b: HandlerError = String::from("bad payload").into();
        assert_eq!(a, b);
        assert_eq!(a.message(), "bad payload");
    }
}
