//! Caller-facing availability query shapes

use crate::errors::HandleReservationError;
use crate::types::{AccountId, AvailabilityVerdict, HandleKind, ReasonCode};
use serde::{Deserialize, Deserializer, Serialize};

pub const RETRY_MESSAGE: &str = "Couldn't check availability, try again";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    #[serde(default)]
    pub handle_kind: HandleKind,
    #[serde(default)]
    pub candidate_handle: String,
    #[serde(
        default,
        deserialize_with = "deserialize_requester",
        skip_serializing_if = "Option::is_none"
    )]
    pub requesting_account_id: Option<AccountId>,
}

fn requester_from(value: Option<&str>) -> Option<AccountId> {
    value.filter(|id| !id.trim().is_empty()).map(AccountId::from)
}

fn deserialize_requester<'de, D>(deserializer: D) -> Result<Option<AccountId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(requester_from(value.as_deref()))
}

impl AvailabilityQuery {
    pub fn new(
        handle_kind: HandleKind,
        candidate_handle: impl Into<String>,
        requesting_account_id: Option<&str>,
    ) -> Self {
        Self {
            handle_kind,
            candidate_handle: candidate_handle.into(),
            requesting_account_id: requester_from(requesting_account_id),
        }
    }

    pub fn username(candidate: impl Into<String>, requesting_account_id: Option<&str>) -> Self {
        Self::new(HandleKind::Username, candidate, requesting_account_id)
    }

    pub fn display_name(
        candidate: impl Into<String>,
        requesting_account_id: Option<&str>,
    ) -> Self {
        Self::new(HandleKind::DisplayName, candidate, requesting_account_id)
    }
}

/// Answer returned to the caller.
///
/// `retryable` is set only for store failures; such an answer says nothing
/// about whether the handle is taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub available: bool,
    pub reason_code: ReasonCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl AvailabilityResponse {
    pub fn from_result(result: Result<AvailabilityVerdict, HandleReservationError>) -> Self {
        match result {
            Ok(verdict) => verdict.into(),
            Err(err) => err.into(),
        }
    }
}

impl From<AvailabilityVerdict> for AvailabilityResponse {
    fn from(verdict: AvailabilityVerdict) -> Self {
        let message = match verdict.reason {
            ReasonCode::HeldByPremium => Some("This handle is reserved by a premium member".into()),
            _ => None,
        };
        Self {
            available: verdict.available,
            reason_code: verdict.reason,
            message,
            retryable: false,
        }
    }
}

impl From<HandleReservationError> for AvailabilityResponse {
    fn from(err: HandleReservationError) -> Self {
        match err {
            HandleReservationError::Validation { reason, message } => Self {
                available: false,
                reason_code: reason,
                message: Some(message),
                retryable: false,
            },
            HandleReservationError::Dependency { .. } => Self {
                available: false,
                reason_code: ReasonCode::StoreUnavailable,
                message: Some(RETRY_MESSAGE.to_string()),
                retryable: true,
            },
        }
    }
}
