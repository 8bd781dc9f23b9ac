//! PIN hashing and verification (argon2 PHC strings)

use anyhow::Result;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hash a plaintext PIN into an argon2 PHC string.
pub fn hash_pin(pin: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("PIN hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a plaintext PIN against a stored PHC string.
///
/// Malformed stored hashes count as a mismatch, never as a pass.
pub fn verify_pin(pin: &str, pin_hash: &str) -> bool {
    match PasswordHash::new(pin_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(pin.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_pin("4321").unwrap();
        assert!(verify_pin("4321", &hash));
        assert!(!verify_pin("1234", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_pin("4321").unwrap();
        let b = hash_pin("4321").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        assert!(!verify_pin("4321", "not-a-phc-string"));
        assert!(!verify_pin("4321", ""));
    }
}
