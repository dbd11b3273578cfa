//! Error types for handle reservation

use crate::types::ReasonCode;
use thiserror::Error;

/// Failure of the profile store collaborator.
#[derive(Error, Debug)]
pub enum ProfileStoreError {
    #[error("profile store backend error: {0}")]
    Backend(String),

    #[error("profile store timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("profile record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum HandleReservationError {
    /// Caller input is malformed. The user should pick a different handle.
    #[error("{message}")]
    Validation { reason: ReasonCode, message: String },

    /// The snapshot could not be obtained. Retryable, never a verdict.
    #[error("could not check handle availability: {message}")]
    Dependency { message: String },
}

impl HandleReservationError {
    pub fn missing_handle() -> Self {
        Self::Validation {
            reason: ReasonCode::MissingHandle,
            message: "handle is required".to_string(),
        }
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::Validation {
            reason: ReasonCode::InvalidFormat,
            message: message.into(),
        }
    }

    pub fn reason(&self) -> ReasonCode {
        match self {
            Self::Validation { reason, .. } => *reason,
            Self::Dependency { .. } => ReasonCode::StoreUnavailable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Dependency { .. })
    }
}

impl From<ProfileStoreError> for HandleReservationError {
    fn from(value: ProfileStoreError) -> Self {
        Self::Dependency {
            message: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HandleReservationError>;
