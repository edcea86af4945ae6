//! Error types for the log-view pipeline with proper context preservation
//!
//! The taxonomy mirrors the propagation policy of the pipeline: job/task
//! lookups and retry selectors are fatal to the whole request, watermark
//! precision failures are fatal to a single conversion only, and metrics or
//! payload problems degrade sections of the record instead of failing it.

use std::error::Error;

/// Main error type for log-view operations
#[derive(Debug, thiserror::Error)]
pub enum LogViewError {
    /// The scheduler has no job under this id
    #[error("can not find job '{job_id}'")]
    JobNotFound { job_id: String },

    /// The job exists but its task metadata is gone
    #[error("can not find task {task_id} referenced by job '{job_id}'")]
    TaskNotFound { job_id: String, task_id: i64 },

    /// Retry attempt index out of range
    #[error("retry attempt {requested} out of range: job '{job_id}' has {available} attempts")]
    InvalidSelector {
        job_id: String,
        requested: u32,
        available: usize,
    },

    /// Watermark digit length does not match any known precision family
    #[error("unknown time precision: watermark '{raw}' has {digits} digits")]
    UnknownPrecision { raw: String, digits: usize },

    /// Metrics backend is not configured or not reachable
    #[error("metrics backend unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    /// A payload did not match its expected shape
    #[error("malformed {shape} payload: {reason}")]
    MalformedPayload { shape: String, reason: String },

    /// A collaborator call failed outright
    #[error("collaborator call failed during {context}")]
    CollaboratorFailed {
        context: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl LogViewError {
    /// Wrap a collaborator failure with the pipeline stage it happened in
    pub fn collaborator<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        Self::CollaboratorFailed {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Shape-mismatch error for a named payload
    pub fn malformed(shape: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::MalformedPayload {
            shape: shape.into(),
            reason: reason.to_string(),
        }
    }

    /// True when the error should abort the whole request rather than
    /// degrade a single section of the record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::JobNotFound { .. }
                | Self::TaskNotFound { .. }
                | Self::InvalidSelector { .. }
                | Self::CollaboratorFailed { .. }
        )
    }
}

/// Result type alias for log-view operations
pub type LogViewResult<T> = Result<T, LogViewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(LogViewError::JobNotFound {
            job_id: "j1".into()
        }
        .is_fatal());
        assert!(LogViewError::InvalidSelector {
            job_id: "j1".into(),
            requested: 4,
            available: 2,
        }
        .is_fatal());
        assert!(!LogViewError::UnknownPrecision {
            raw: "123".into(),
            digits: 3,
        }
        .is_fatal());
        assert!(!LogViewError::UpstreamUnavailable {
            reason: "no endpoint".into(),
        }
        .is_fatal());
    }

    #[test]
    fn test_display_carries_context() {
        let err = LogViewError::UnknownPrecision {
            raw: "12345".into(),
            digits: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("12345"));
        assert!(msg.contains("5 digits"));
    }
}
