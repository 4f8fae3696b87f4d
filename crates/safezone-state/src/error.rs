//! Error types for safezone-state

use thiserror::Error;

/// Errors raised by collaborators (location source, notification sink,
/// history store, geofence service).
///
/// The engine only cares about one distinction: can the same call succeed
/// if it is retried later? See [`CollaboratorError::is_transient`].
#[derive(Error, Debug)]
pub enum CollaboratorError {
    /// Network or backing service temporarily unavailable
    #[error("{service} temporarily unavailable: {reason}")]
    Transient { service: String, reason: String },

    /// Non-recoverable failure (bad credentials, malformed configuration)
    #[error("{service} failed permanently: {reason}")]
    Permanent { service: String, reason: String },

    /// Capability missing on this device (permission revoked, no geofencing)
    #[error("{service} not available: {reason}")]
    NotAvailable { service: String, reason: String },

    /// The call did not complete within its deadline
    #[error("{service} timed out after {millis} ms")]
    Timeout { service: String, millis: u64 },

    /// Filesystem error in a file-backed adapter
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed record at the collaborator boundary
    #[error("Malformed record: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CollaboratorError {
    pub fn transient(service: impl Into<String>, reason: impl Into<String>) -> Self {
        CollaboratorError::Transient {
            service: service.into(),
            reason: reason.into(),
        }
    }

    pub fn permanent(service: impl Into<String>, reason: impl Into<String>) -> Self {
        CollaboratorError::Permanent {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call later may succeed.
    ///
    /// I/O errors count as transient: a file-backed feed that is missing or
    /// locked right now is expected to come back.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CollaboratorError::Transient { .. }
                | CollaboratorError::Timeout { .. }
                | CollaboratorError::Io(_)
        )
    }
}
