//! Error types for the ceremony core.
//!
//! Every failure here is local and non-fatal: callers log it and either drop
//! the offending event or fall back to `idle`.

use thiserror::Error;

/// Core ceremony errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CeremonyError {
    // Landmark / frame errors
    #[error("Invalid landmark set: expected {expected} points, got {actual}")]
    WrongLandmarkCount { expected: usize, actual: usize },

    #[error("Invalid landmark {index}: coordinates must be finite")]
    NonFiniteLandmark { index: usize },

    #[error("Invalid frame size {width}x{height}")]
    InvalidFrame { width: f32, height: f32 },

    // Layout errors
    #[error("Layout not ready: no usable viewport rect")]
    LayoutUnready,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CeremonyError {
    /// True for the malformed-input family (bad landmarks or frame size).
    ///
    /// These are surfaced to logging but never propagated as a gesture.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            CeremonyError::WrongLandmarkCount { .. }
                | CeremonyError::NonFiniteLandmark { .. }
                | CeremonyError::InvalidFrame { .. }
        )
    }
}

/// Result type for ceremony operations
pub type CeremonyResult<T> = Result<T, CeremonyError>;
