use serde::{Deserialize, Serialize};

use crate::error::{msg, AppError, Result};

/// Basic email format validation.
///
/// Validates that email has:
/// - Exactly one @ symbol
/// - Non-empty local part (before @)
/// - Non-empty domain part (after @) with at least one dot
///
/// This is intentionally permissive to avoid rejecting valid but unusual
/// emails. It's not meant to be RFC 5322 compliant - just a sanity check.
pub fn validate_email_format(email: &str) -> Result<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(AppError::BadRequest(msg::EMAIL_EMPTY.into()));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    let local_part = parts[0];
    let domain_part = parts[1];

    if local_part.is_empty() || local_part.contains(' ') {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    if domain_part.is_empty()
        || !domain_part.contains('.')
        || domain_part.starts_with('.')
        || domain_part.ends_with('.')
    {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    Ok(())
}

/// E.164 phone number validation: +, country code, max 15 digits total.
pub fn validate_phone_format(phone: &str) -> Result<()> {
    let phone = phone.trim();
    let digits = match phone.strip_prefix('+') {
        Some(d) => d,
        None => return Err(AppError::BadRequest(msg::INVALID_PHONE_FORMAT.into())),
    };
    if digits.len() < 8 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest(msg::INVALID_PHONE_FORMAT.into()));
    }
    Ok(())
}

/// User profile - identity plus the minute wallet.
///
/// `password_hash` is intentionally not part of this struct; it never leaves
/// the auth queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub phone_verified: bool,
    /// Remaining talk minutes. Only mutated through guarded updates.
    pub available_minutes: i64,
    #[serde(skip_serializing)]
    pub stripe_customer_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProfile {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl CreateProfile {
    pub fn validate(&self) -> Result<()> {
        validate_email_format(&self.email)?;
        if self.password.len() < 8 {
            return Err(AppError::BadRequest(msg::PASSWORD_TOO_SHORT.into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfile {
    pub display_name: Option<String>,
    /// Setting a new phone number resets `phone_verified`.
    pub phone_number: Option<String>,
}

impl UpdateProfile {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref phone) = self.phone_number {
            validate_phone_format(phone)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_normal_emails() {
        assert!(validate_email_format("user@example.com").is_ok());
        assert!(validate_email_format("first.last+tag@sub.example.co").is_ok());
    }

    #[test]
    fn rejects_malformed_emails() {
        assert!(validate_email_format("").is_err());
        assert!(validate_email_format("no-at-sign").is_err());
        assert!(validate_email_format("two@@example.com").is_err());
        assert!(validate_email_format("@example.com").is_err());
        assert!(validate_email_format("user@nodot").is_err());
        assert!(validate_email_format("user@.example.com").is_err());
        assert!(validate_email_format("a b@example.com").is_err());
    }

    #[test]
    fn phone_must_be_e164() {
        assert!(validate_phone_format("+15551234567").is_ok());
        assert!(validate_phone_format("+442071838750").is_ok());
        assert!(validate_phone_format("+15551234").is_ok());
        assert!(validate_phone_format("5551234567").is_err());
        assert!(validate_phone_format("+1555123").is_err());
        assert!(validate_phone_format("+1555123456789012").is_err());
        assert!(validate_phone_format("+1555abc4567").is_err());
    }
}
