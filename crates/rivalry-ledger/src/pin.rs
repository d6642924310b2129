//! Wallet PIN hashing (Argon2id).

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rivalry_types::{PinHashConfig, Result, RivalryError};

/// Salted one-way hashing of 6-digit wallet PINs.
#[derive(Clone)]
pub struct PinHasher {
    argon2: Argon2<'static>,
}

impl PinHasher {
    /// # Errors
    /// Returns `Configuration` for cost parameters Argon2 rejects.
    pub fn new(config: &PinHashConfig) -> Result<Self> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| RivalryError::Configuration(format!("invalid Argon2 params: {e}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a PIN into a PHC string.
    pub fn hash(&self, pin: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(pin.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| RivalryError::Internal(format!("PIN hashing failed: {e}")))
    }

    /// Constant-time check of a PIN against a stored hash.
    ///
    /// An unparseable stored hash never verifies.
    #[must_use]
    pub fn verify(&self, pin: &str, stored: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            tracing::warn!("Stored PIN hash is not a valid PHC string");
            return false;
        };
        self.argon2.verify_password(pin.as_bytes(), &parsed).is_ok()
    }
}

impl std::fmt::Debug for PinHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinHasher").finish_non_exhaustive()
    }
}
