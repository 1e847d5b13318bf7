//! Password hashing
//!
//! Argon2id with the argon2 crate's default parameters and a fresh random
//! salt per hash. Hashes are stored in PHC string format, so the parameters
//! travel with the hash.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password using Argon2id with secure defaults.
///
/// # Errors
///
/// Returns an error if password hashing fails
///
/// # Example
///
/// ```ignore
/// use quillpost::services::password::hash_password;
///
/// let hash = hash_password("my_secure_password")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    Ok(password_hash.to_string())
}

/// Verify a password against a stored PHC hash.
///
/// A mismatch is `Ok(false)`; only a malformed hash or an internal failure is
/// an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id_and_salted() {
        let hash1 = hash_password("hunter2").expect("Failed to hash password");
        let hash2 = hash_password("hunter2").expect("Failed to hash password");

        assert!(hash1.starts_with("$argon2id$"));
        assert_ne!(hash1, hash2, "Each hash should use its own salt");
        assert!(!hash1.contains("hunter2"));
    }

    #[test]
    fn test_verify_password_roundtrip() {
        let hash = hash_password("correct horse").expect("Failed to hash password");

        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("correct horse!", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        let result = verify_password("password", "pbkdf2:sha256:260000$salt$hash");
        assert!(result.is_err(), "Non-PHC hashes should be rejected");
    }

    #[test]
    fn test_unicode_password() {
        let hash = hash_password("pässwörd🔐").expect("Failed to hash unicode password");
        assert!(verify_password("pässwörd🔐", &hash).unwrap());
    }
}
