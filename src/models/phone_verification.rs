use serde::Serialize;

/// Verification codes expire after 10 minutes.
pub const VERIFICATION_CODE_TTL_SECS: i64 = 600;

/// A code is dead after this many failed checks.
pub const VERIFICATION_MAX_ATTEMPTS: i64 = 5;

/// A short-lived SMS verification code. Only the hash is stored.
#[derive(Debug, Clone, Serialize)]
pub struct PhoneVerification {
    pub id: String,
    pub user_id: String,
    pub phone_number: String,
    #[serde(skip_serializing)]
    pub code_hash: String,
    pub expires_at: i64,
    pub used: bool,
    pub attempts: i64,
    pub created_at: i64,
}
