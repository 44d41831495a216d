use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("password hashing failed")]
pub struct HashError;

/// Hash a password into a PHC string with a fresh random salt.
///
/// # Errors
///
/// Fails only when the hasher itself fails (entropy/allocation), never
/// because of the password's content.
pub fn hash(password: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| HashError)?
        .to_string();
    Ok(phc)
}

/// Check a candidate password against a stored PHC hash. Returns
/// `false` for a mismatch or a malformed hash, never errors.
#[must_use]
pub fn verify(hash: &str, candidate: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    } else {
        false
    }
}
