//! Job: the unit of work handed to the worker pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::JobId;

/// A unit of work carrying an identifier and an opaque payload.
///
/// Design:
/// - Immutable once built (fields are private, no setters).
/// - Consumed by value: the worker that claims it owns it, and it is dropped
///   after the handler returns. The pool keeps no result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job<P> {
    id: JobId,
    payload: P,
    submitted_at: DateTime<Utc>,
}

impl<P> Job<P> {
    pub fn new(id: u64, payload: P) -> Self {
        Self::with_id(JobId::new(id), payload)
    }

    pub fn with_id(id: JobId, payload: P) -> Self {
        Self {
            id,
            payload,
            submitted_at: Utc::now(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Take the payload out, consuming the job.
    pub fn into_payload(self) -> P {
        self.payload
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// How long this job has been waiting since it was built.
    pub fn waited_ms(&self) -> i64 {
        (Utc::now() - self.submitted_at).num_milliseconds()
    }
}
