use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{self, FieldError, ValidationErrors};

/// A stored user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the record is soft-deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields accepted when creating or updating a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl UserInput {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Check every field and collect all failures.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(FieldError::new("name", "name is required"));
        } else {
            let len = name.chars().count();
            if len < validation::NAME_MIN_LEN {
                errors.push(FieldError::new(
                    "name",
                    format!("must be at least {} characters long", validation::NAME_MIN_LEN),
                ));
            } else if len > validation::NAME_MAX_LEN {
                errors.push(FieldError::new(
                    "name",
                    format!("must be at most {} characters long", validation::NAME_MAX_LEN),
                ));
            }
            if !validation::is_valid_name(name) {
                errors.push(FieldError::new(
                    "name",
                    "must contain only letters, spaces, hyphens, and apostrophes",
                ));
            }
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.push(FieldError::new("email", "email is required"));
        } else if !validation::is_valid_email(email) {
            errors.push(FieldError::new("email", "must be a valid email address"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }

    /// Trimmed name and trimmed, lowercased email.
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
        }
    }
}
