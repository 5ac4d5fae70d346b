//! Client-side form rules. Nothing here touches the network.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Permissive `local@domain.tld` shape.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("All fields are required")]
    MissingFields,

    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Email address is not valid")]
    InvalidEmail,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    /// Checks run in order: required fields, match, length, email shape.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty()
            || self.email.is_empty()
            || self.password.is_empty()
            || self.confirm_password.is_empty()
        {
            return Err(ValidationError::MissingFields);
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LENGTH,
            });
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::InvalidEmail);
        }
        Ok(())
    }
}

pub fn validate_login(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.is_empty() || password.is_empty() {
        return Err(ValidationError::MissingCredentials);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(password: &str, confirm: &str, email: &str) -> RegistrationForm {
        RegistrationForm {
            name: "Ana".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.io"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("us er@example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_registration_rules_in_order() {
        assert_eq!(
            RegistrationForm::default().validate(),
            Err(ValidationError::MissingFields)
        );
        assert_eq!(
            form("secret1", "secret2", "user@example.com").validate(),
            Err(ValidationError::PasswordMismatch)
        );
        assert_eq!(
            form("abc", "abc", "user@example.com").validate(),
            Err(ValidationError::PasswordTooShort { min: 6 })
        );
        assert_eq!(
            form("secret1", "secret1", "not-an-email").validate(),
            Err(ValidationError::InvalidEmail)
        );
        assert_eq!(form("secret1", "secret1", "user@example.com").validate(), Ok(()));
    }

    #[test]
    fn test_password_length_counts_chars() {
        assert!(form("ñññññ", "ñññññ", "user@example.com").validate().is_err());
        assert!(form("ññññññ", "ññññññ", "user@example.com").validate().is_ok());
    }

    #[test]
    fn test_validate_login() {
        assert_eq!(validate_login("", "x"), Err(ValidationError::MissingCredentials));
        assert_eq!(validate_login("a@b.c", ""), Err(ValidationError::MissingCredentials));
        assert_eq!(validate_login("a@b.c", "x"), Ok(()));
    }
}
