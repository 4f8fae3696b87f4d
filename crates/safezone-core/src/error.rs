//! Domain-level error taxonomy for SafeZone.

use safezone_state::CollaboratorError;

/// SafeZone engine errors.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("invalid zone {zone_id}: {reason}")]
    InvalidZone { zone_id: String, reason: String },

    #[error("transient fetch failure for {subject_id}: {detail}")]
    TransientFetchFailure { subject_id: String, detail: String },

    #[error("permanent failure: {0}")]
    PermanentFailure(String),

    #[error("{effect} side effect failed: {detail}")]
    SideEffectFailure { effect: SideEffect, detail: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The two independent side effects of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    Notify,
    Persist,
}

impl std::fmt::Display for SideEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SideEffect::Notify => f.write_str("notify"),
            SideEffect::Persist => f.write_str("persist"),
        }
    }
}

/// Result type for SafeZone engine operations.
pub type MonitorResult<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_coordinate_display() {
        let err = MonitorError::InvalidCoordinate {
            latitude: 91.0,
            longitude: 0.0,
        };
        assert!(err.to_string().contains("invalid coordinate"));
        assert!(err.to_string().contains("91"));
    }

    #[test]
    fn test_side_effect_failure_names_effect() {
        let err = MonitorError::SideEffectFailure {
            effect: SideEffect::Persist,
            detail: "store offline".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("persist"));
        assert!(msg.contains("store offline"));
    }

    #[test]
    fn test_collaborator_error_converts() {
        let err: MonitorError = CollaboratorError::transient("location", "offline").into();
        assert!(matches!(err, MonitorError::Collaborator(_)));
    }
}
