//! Types for handle reservation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a marketplace account
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Which profile field a handle lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    #[default]
    Username,
    DisplayName,
}

impl HandleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleKind::Username => "username",
            HandleKind::DisplayName => "display_name",
        }
    }

    /// Only usernames go through the format validator.
    pub fn requires_format_check(&self) -> bool {
        matches!(self, HandleKind::Username)
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one profile's handle as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileHandleRecord {
    pub owner_account_id: AccountId,
    /// `None` means unset. Never an empty string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle_value: Option<String>,
    pub is_premium_holder: bool,
}

impl ProfileHandleRecord {
    /// Build a record, folding blank handle values into `None`.
    pub fn new(
        owner_account_id: impl Into<AccountId>,
        handle_value: Option<String>,
        is_premium_holder: bool,
    ) -> Self {
        Self {
            owner_account_id: owner_account_id.into(),
            handle_value: handle_value.filter(|value| !value.trim().is_empty()),
            is_premium_holder,
        }
    }

    /// Case-insensitive exact match against an already trimmed candidate.
    pub fn holds(&self, candidate: &str) -> bool {
        self.handle_value
            .as_deref()
            .is_some_and(|value| value.to_lowercase() == candidate.to_lowercase())
    }
}

impl From<String> for AccountId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Machine-readable reason attached to every availability answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    MissingHandle,
    InvalidFormat,
    NoHolder,
    OwnProfile,
    HeldByPremium,
    CanTakeFromNonPremium,
    StoreUnavailable,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::MissingHandle => "missing_handle",
            ReasonCode::InvalidFormat => "invalid_format",
            ReasonCode::NoHolder => "no_holder",
            ReasonCode::OwnProfile => "own_profile",
            ReasonCode::HeldByPremium => "held_by_premium",
            ReasonCode::CanTakeFromNonPremium => "can_take_from_non_premium",
            ReasonCode::StoreUnavailable => "store_unavailable",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability decision for a candidate handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityVerdict {
    pub available: bool,
    pub reason: ReasonCode,
}

impl AvailabilityVerdict {
    pub fn available(reason: ReasonCode) -> Self {
        Self {
            available: true,
            reason,
        }
    }

    pub fn unavailable(reason: ReasonCode) -> Self {
        Self {
            available: false,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_handle_values_are_unset() {
        let record = ProfileHandleRecord::new("u1", Some("   ".into()), false);
        assert_eq!(record.handle_value, None);
        assert!(!record.holds(""));
    }

    #[test]
    fn holds_ignores_case() {
        let record = ProfileHandleRecord::new("u1", Some("JohnDoe".into()), false);
        assert!(record.holds("johndoe"));
        assert!(record.holds("JOHNDOE"));
        assert!(!record.holds("john"));
    }

    #[test]
    fn reason_codes_serialize_as_snake_case() {
        let json = serde_json::to_string(&ReasonCode::CanTakeFromNonPremium).unwrap();
        assert_eq!(json, "\"can_take_from_non_premium\"");
        assert_eq!(
            ReasonCode::HeldByPremium.to_string(),
            ReasonCode::HeldByPremium.as_str()
        );
    }

    #[test]
    fn handle_kind_defaults_to_username() {
        assert_eq!(HandleKind::default(), HandleKind::Username);
        let kind: HandleKind = serde_json::from_str("\"display_name\"").unwrap();
        assert_eq!(kind, HandleKind::DisplayName);
        assert!(!kind.requires_format_check());
    }
}
