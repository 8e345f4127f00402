//! Password hashing and policy.
//!
//! Hashes are Argon2id PHC strings with a random salt. Reduced cost
//! parameters are used under `cfg(test)` only.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
#[cfg(test)]
use argon2::{Algorithm, Params, Version};
use thiserror::Error;

use rolegate_core::{DomainError, DomainResult};

/// Prefix every stored hash must carry.
pub const PASSWORD_HASH_PREFIX: &str = "$argon2";

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[inline]
fn argon2_instance() -> Argon2<'static> {
    #[cfg(test)]
    {
        // 1 MiB, 1 iteration.
        match Params::new(1024, 1, 1, None) {
            Ok(params) => Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            Err(_) => Argon2::default(),
        }
    }

    #[cfg(not(test))]
    {
        Argon2::default()
    }
}

pub fn hash_password(raw: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2_instance()
        .hash_password(raw.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Constant-time verification against a stored PHC string. Unparsable hashes
/// never verify.
pub fn verify_password(raw: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => argon2_instance().verify_password(raw.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

pub fn is_password_hash(value: &str) -> bool {
    value.starts_with(PASSWORD_HASH_PREFIX)
}

/// Return `value` unchanged if it already looks like a hash, otherwise hash
/// it. Every persist path runs stored passwords through this.
pub fn ensure_hashed(value: String) -> Result<String, PasswordError> {
    if is_password_hash(&value) {
        Ok(value)
    } else {
        tracing::warn!("plaintext password reached a persist path; hashing before storage");
        hash_password(&value)
    }
}

/// At least six characters, mixing letters with something else.
pub fn check_password_policy(raw: &str) -> DomainResult<()> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    if raw.chars().all(|c| c.is_numeric()) || raw.chars().all(|c| c.is_alphabetic()) {
        return Err(DomainError::validation("password must contain letters and digits"));
    }
    Ok(())
}
