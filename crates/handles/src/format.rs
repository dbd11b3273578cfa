//! Username format validation

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static USERNAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._]*[A-Za-z0-9])?$").expect("static username pattern")
});

const SPECIAL_SEQUENCES: [&str; 4] = ["..", "__", "._", "_."];

/// Outcome of a format check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatValidation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FormatValidation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Format policy applied to usernames before any ownership check.
pub trait HandleFormatValidator: Send + Sync {
    fn validate_handle_format(&self, value: &str) -> FormatValidation;
}

#[derive(Debug, Clone)]
pub struct UsernameFormatValidator {
    min_len: usize,
    max_len: usize,
}

impl UsernameFormatValidator {
    pub const MIN_LEN: usize = 3;
    pub const MAX_LEN: usize = 30;

    pub fn new() -> Self {
        Self::with_limits(Self::MIN_LEN, Self::MAX_LEN)
    }

    pub fn with_limits(min_len: usize, max_len: usize) -> Self {
        Self { min_len, max_len }
    }
}

impl Default for UsernameFormatValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleFormatValidator for UsernameFormatValidator {
    fn validate_handle_format(&self, value: &str) -> FormatValidation {
        let len = value.chars().count();
        if len < self.min_len || len > self.max_len {
            return FormatValidation::rejected(format!(
                "Username must be between {} and {} characters",
                self.min_len, self.max_len
            ));
        }

        if !USERNAME_PATTERN.is_match(value) {
            return FormatValidation::rejected(
                "Username may only contain letters, numbers, dots or underscores, and must start and end with a letter or number",
            );
        }

        if SPECIAL_SEQUENCES.iter().any(|seq| value.contains(seq)) {
            return FormatValidation::rejected(
                "Username cannot contain consecutive special characters",
            );
        }

        FormatValidation::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_usernames() {
        let validator = UsernameFormatValidator::new();
        for name in ["ana", "John.Doe", "user_42", "a1b"] {
            assert!(validator.validate_handle_format(name).valid, "{name}");
        }
    }

    #[test]
    fn rejects_length_out_of_bounds() {
        let validator = UsernameFormatValidator::new();
        let short = validator.validate_handle_format("ab");
        assert!(!short.valid);
        assert!(short.error.unwrap().contains("between 3 and 30"));
        assert!(!validator.validate_handle_format(&"a".repeat(31)).valid);
    }

    #[test]
    fn rejects_bad_characters_and_edges() {
        let validator = UsernameFormatValidator::new();
        for name in ["_ana", "ana.", "an a", "anä", "ana-doe"] {
            assert!(!validator.validate_handle_format(name).valid, "{name}");
        }
    }

    #[test]
    fn rejects_consecutive_specials() {
        let validator = UsernameFormatValidator::new();
        let result = validator.validate_handle_format("ana..doe");
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("consecutive"));
        assert!(!validator.validate_handle_format("ana._doe").valid);
    }

    #[test]
    fn custom_limits_apply() {
        let validator = UsernameFormatValidator::with_limits(1, 5);
        assert!(validator.validate_handle_format("a").valid);
        assert!(!validator.validate_handle_format("abcdef").valid);
    }
}
