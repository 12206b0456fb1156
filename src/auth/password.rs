use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier as _, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::auth::service::PasswordVerifier;

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> anyhow::Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("Invalid password hash: {e}"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Argon2 verification, run on the blocking pool.
pub struct Argon2Verifier {
    decoy: String,
}

impl Argon2Verifier {
    /// Builds the verifier with a decoy hash of a random throwaway password.
    pub fn new() -> anyhow::Result<Self> {
        let filler: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        Ok(Argon2Verifier {
            decoy: hash_password(&filler)?,
        })
    }

    pub async fn hash(&self, password: &str) -> anyhow::Result<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| anyhow::anyhow!("Task join error: {}", e))?
    }
}

#[async_trait]
impl PasswordVerifier for Argon2Verifier {
    async fn verify(&self, candidate: &str, stored: &str) -> anyhow::Result<bool> {
        let candidate = candidate.to_string();
        let stored = stored.to_string();
        tokio::task::spawn_blocking(move || verify_password(&stored, &candidate))
            .await
            .map_err(|e| anyhow::anyhow!("Task join error: {}", e))?
    }

    fn decoy_hash(&self) -> &str {
        &self.decoy
    }
}
