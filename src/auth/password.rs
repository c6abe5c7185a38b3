//! Password hashing and verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
        rand_core::OsRng,
    },
};

use crate::error::Error;

/// Argon2id cost: 19 MiB, 2 passes, 1 lane (RFC 9106 second recommendation).
const MEMORY_KIB: u32 = 19_456;
const ITERATIONS: u32 = 2;
const PARALLELISM: u32 = 1;

/// PasswordHasher
///
/// One-way adaptive hashing of user passwords. The produced PHC string embeds
/// algorithm, cost and salt, so verification needs nothing but the stored hash.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new() -> Result<Self, Error> {
        let params =
            Params::new(MEMORY_KIB, ITERATIONS, PARALLELISM, None).map_err(|e| Error::Internal {
                operation: format!("create argon2 params: {e}"),
            })?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Internal {
                operation: format!("hash password: {e}"),
            })?;

        Ok(hash.to_string())
    }

    /// Check a password against a stored hash.
    ///
    /// The digest comparison inside argon2 is constant time. A hash that cannot
    /// be parsed resolves to `false`, exactly like a wrong password.
    pub fn verify(&self, hash: &str, password: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// `hash` on the blocking pool, keeping Argon2 off the async workers.
    pub async fn spawn_hash(&self, password: &str) -> Result<String, Error> {
        let hasher = self.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| Error::Internal {
                operation: format!("spawn password hashing task: {e}"),
            })?
    }

    /// `verify` on the blocking pool.
    pub async fn spawn_verify(&self, hash: &str, password: &str) -> Result<bool, Error> {
        let hasher = self.clone();
        let hash = hash.to_string();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
            .await
            .map_err(|e| Error::Internal {
                operation: format!("spawn password verification task: {e}"),
            })
    }
}
