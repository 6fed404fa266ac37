use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand_core::OsRng;
use tracing::debug;

use crate::config::Config;

/// Checks a plaintext credential pair against the configured administrator.
///
/// Fails closed: empty username or password, a username mismatch, a
/// malformed stored hash, and a failed verification all yield `false`.
pub fn verify_credentials(config: &Config, username: &str, password: &str) -> bool {
    if username.is_empty() || password.is_empty() {
        debug!("credential check rejected: empty username or password");
        return false;
    }

    if username != config.admin_username {
        debug!(username, "credential check rejected: unknown username");
        return false;
    }

    if !verify_password(password, &config.admin_password_hash) {
        debug!(username, "credential check rejected: bad password");
        return false;
    }

    true
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}
