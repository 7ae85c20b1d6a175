//! Hashing helpers for phone verification codes.
//!
//! Codes are short-lived 6-digit secrets sent over SMS. Only a SHA-256 hash
//! is stored; comparison is constant-time.

use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Generate a 6-digit verification code as a zero-padded string.
pub fn generate_verification_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

/// SHA-256 hash of a verification code, hex-encoded for storage.
pub fn hash_verification_code(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    hex::encode(digest)
}

/// Constant-time check of a submitted code against the stored hash.
pub fn verify_code(code: &str, stored_hash: &str) -> bool {
    let computed = hash_verification_code(code);
    computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_six_digits() {
        for _ in 0..50 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn verify_matches_only_the_right_code() {
        let hash = hash_verification_code("123456");
        assert!(verify_code("123456", &hash));
        assert!(!verify_code("654321", &hash));
    }
}
