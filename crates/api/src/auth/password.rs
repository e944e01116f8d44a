//! Argon2id password hashing, verification, and strength validation.
//!
//! All password hashes use the Argon2id variant with a cryptographically random
//! salt generated via [`OsRng`]. The PHC string format is used for storage so
//! that algorithm parameters and salt are embedded in the hash itself; verifying
//! an older hash therefore keeps working after the cost parameters change.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use super::error::HashingError;

/// Argon2 cost parameters.
///
/// The defaults are the argon2 crate's recommended values (19 MiB, 2 passes,
/// 1 lane), which put a single verification in the tens of milliseconds on
/// current server hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HasherConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Salted one-way password hasher.
#[derive(Debug, Clone, Default)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// Build a hasher, rejecting cost parameters argon2 considers invalid.
    pub fn new(config: HasherConfig) -> Result<Self, HashingError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| HashingError(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext password with a fresh random salt.
    ///
    /// Returns the PHC-formatted hash string (includes algorithm, params, salt, and hash).
    pub fn hash(&self, password: &str) -> Result<String, HashingError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| HashingError(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Verify a plaintext password against a stored PHC-formatted hash.
    ///
    /// Returns `Ok(true)` if the password matches, `Ok(false)` if it does not,
    /// and `Err` only when `hash` cannot be parsed.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, HashingError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| HashingError(e.to_string()))?;
        match self
            .argon2()
            .verify_password(password.as_bytes(), &parsed_hash)
        {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(HashingError(e.to_string())),
        }
    }
}

/// Validate that a password meets minimum strength requirements.
///
/// Currently enforces a minimum character length. Returns `Ok(())` when the
/// password is acceptable, or `Err` with a human-readable explanation.
pub fn validate_password_strength(password: &str, min_length: usize) -> Result<(), String> {
    if password.chars().count() < min_length {
        return Err(format!(
            "Password must be at least {min_length} characters long"
        ));
    }
    Ok(())
}
