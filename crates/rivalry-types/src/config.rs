//! Configuration types for Rivalry services.
//!
//! Configuration is read from the environment once at startup. The only
//! required value is the field encryption key; its absence is fatal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{constants, GameType, RivalryError, Result};

/// 256-bit symmetric key for field-level encryption.
///
/// `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex string.
    ///
    /// # Errors
    /// Returns `Configuration` if the string is not valid hex or not 32 bytes.
    pub fn from_hex(raw: &str) -> Result<Self> {
        let bytes = hex::decode(raw.trim()).map_err(|e| {
            RivalryError::Configuration(format!("{} is not valid hex: {e}", constants::ENV_ENCRYPTION_KEY))
        })?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            RivalryError::Configuration(format!(
                "{} must decode to 32 bytes, got {}",
                constants::ENV_ENCRYPTION_KEY,
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// A random key. Only for tests and local tooling.
    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// Argon2 cost parameters for wallet PIN hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinHashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PinHashConfig {
    fn default() -> Self {
        Self {
            memory_kib: constants::DEFAULT_PIN_HASH_MEMORY_KIB,
            iterations: constants::DEFAULT_PIN_HASH_ITERATIONS,
            parallelism: constants::DEFAULT_PIN_HASH_PARALLELISM,
        }
    }
}

/// Ledger tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// PIN hashing cost.
    pub pin_hash: PinHashConfig,
    /// Lifetime of PIN-reset OTPs, in seconds.
    pub otp_ttl_secs: i64,
    /// Optimistic retries per read-modify-write before reporting contention.
    pub max_write_retries: u32,
    /// Attempts at drawing an unused account number.
    pub account_number_attempts: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            pin_hash: PinHashConfig::default(),
            otp_ttl_secs: constants::OTP_TTL_SECS,
            max_write_retries: constants::DEFAULT_MAX_WRITE_RETRIES,
            account_number_attempts: constants::DEFAULT_ACCOUNT_NUMBER_ATTEMPTS,
        }
    }
}

/// Match lifecycle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Default capacity for CS matches.
    pub cs_max_players: u32,
    /// Default capacity for BR matches.
    pub br_max_players: u32,
    /// Radius of the discovery proximity filter.
    pub discovery_radius_km: f64,
    /// UTC offset, in minutes, of the `match_date`/`match_time` strings.
    pub schedule_utc_offset_minutes: i32,
    /// Optimistic retries per match write.
    pub max_write_retries: u32,
}

impl ArenaConfig {
    /// Default capacity for a game type.
    #[must_use]
    pub fn default_max_players(&self, game_type: GameType) -> u32 {
        match game_type {
            GameType::Cs => self.cs_max_players,
            GameType::Br => self.br_max_players,
        }
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            cs_max_players: constants::DEFAULT_CS_MAX_PLAYERS,
            br_max_players: constants::DEFAULT_BR_MAX_PLAYERS,
            discovery_radius_km: constants::DEFAULT_DISCOVERY_RADIUS_KM,
            schedule_utc_offset_minutes: 0,
            max_write_retries: constants::DEFAULT_MAX_WRITE_RETRIES,
        }
    }
}

/// Logging output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: constants::DEFAULT_LOG_FILTER.to_string(),
            json: false,
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub encryption_key: EncryptionKey,
    pub ledger: LedgerConfig,
    pub arena: ArenaConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from process environment variables.
    ///
    /// # Required Environment Variables
    ///
    /// - `WALLET_ENCRYPTION_KEY`: 64 hex characters (32 bytes)
    ///
    /// # Optional Environment Variables
    ///
    /// - `RIVALRY_LOG`: tracing filter (default: `info`)
    /// - `RIVALRY_LOG_JSON`: `true` for JSON output
    /// - `RIVALRY_SCHEDULE_UTC_OFFSET_MINUTES`: offset of displayed match times
    /// - `RIVALRY_DISCOVERY_RADIUS_KM`: discovery radius (default: 50)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw_key = lookup(constants::ENV_ENCRYPTION_KEY).ok_or_else(|| {
            RivalryError::Configuration(format!(
                "{} is not defined",
                constants::ENV_ENCRYPTION_KEY
            ))
        })?;
        let encryption_key = EncryptionKey::from_hex(&raw_key)?;

        let mut arena = ArenaConfig::default();
        if let Some(raw) = lookup(constants::ENV_SCHEDULE_OFFSET) {
            arena.schedule_utc_offset_minutes = raw.trim().parse().map_err(|_| {
                RivalryError::Configuration(format!(
                    "{} must be an integer",
                    constants::ENV_SCHEDULE_OFFSET
                ))
            })?;
        }
        if let Some(raw) = lookup(constants::ENV_DISCOVERY_RADIUS) {
            let radius: f64 = raw.trim().parse().map_err(|_| {
                RivalryError::Configuration(format!(
                    "{} must be a number",
                    constants::ENV_DISCOVERY_RADIUS
                ))
            })?;
            if !radius.is_finite() || radius <= 0.0 {
                return Err(RivalryError::Configuration(format!(
                    "{} must be positive",
                    constants::ENV_DISCOVERY_RADIUS
                )));
            }
            arena.discovery_radius_km = radius;
        }

        let log = LogConfig {
            filter: lookup(constants::ENV_LOG_FILTER)
                .unwrap_or_else(|| constants::DEFAULT_LOG_FILTER.to_string()),
            json: lookup(constants::ENV_LOG_JSON)
                .is_some_and(|v| matches!(v.trim(), "1" | "true" | "TRUE")),
        };

        Ok(Self {
            encryption_key,
            ledger: LedgerConfig::default(),
            arena,
            log,
        })
    }

    /// A configuration with a random key and cheap PIN hashing.
    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            encryption_key: EncryptionKey::random(),
            ledger: LedgerConfig {
                pin_hash: PinHashConfig {
                    memory_kib: 64,
                    iterations: 1,
                    parallelism: 1,
                },
                ..LedgerConfig::default()
            },
            arena: ArenaConfig::default(),
            log: LogConfig::default(),
        }
    }
}
