use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub(crate) const NAME_MIN_LEN: usize = 2;
pub(crate) const NAME_MAX_LEN: usize = 100;

static NAME_PATTERN: Lazy<regex_lite::Regex> = Lazy::new(|| {
    regex_lite::Regex::new(r"^[a-zA-Z\s\-'\.]+$").expect("name pattern is valid")
});

static EMAIL_PATTERN: Lazy<regex_lite::Regex> = Lazy::new(|| {
    regex_lite::Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

pub(crate) fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// All validation failures for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no validation errors");
        }
        let messages: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_pattern() {
        assert!(is_valid_name("Mary-Jane O'Brien Jr."));
        assert!(!is_valid_name("bob_42"));
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("missing-at.example.org"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@example.org"));
    }

    #[test]
    fn test_display_joins_messages() {
        let errors = ValidationErrors::from(vec![
            FieldError::new("name", "name is required"),
            FieldError::new("email", "email is required"),
        ]);
        assert_eq!(
            errors.to_string(),
            "name: name is required; email: email is required"
        );
    }

    #[test]
    fn test_serializes_as_list() {
        let errors = ValidationErrors::from(vec![FieldError::new("email", "bad")]);
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!([{"field": "email", "message": "bad"}]));
    }
}
