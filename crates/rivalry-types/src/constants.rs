//! System-wide constants for the Rivalry backend.

/// Number of digits in a wallet PIN.
pub const PIN_LENGTH: usize = 6;

/// Number of digits in a one-time password.
pub const OTP_LENGTH: usize = 6;

/// Lifetime of a PIN-reset OTP in seconds (10 minutes).
pub const OTP_TTL_SECS: i64 = 600;

/// Number of digits in a wallet account number.
pub const ACCOUNT_NUMBER_LEN: usize = 10;

/// Leading digit of every generated account number.
pub const ACCOUNT_NUMBER_PREFIX: char = '1';

/// Attempts at drawing an unused account number before giving up.
pub const DEFAULT_ACCOUNT_NUMBER_ATTEMPTS: usize = 16;

/// Optimistic-concurrency retries for a single read-modify-write.
pub const DEFAULT_MAX_WRITE_RETRIES: u32 = 8;

/// Argon2 memory cost for PIN hashing (KiB).
pub const DEFAULT_PIN_HASH_MEMORY_KIB: u32 = 19_456;

/// Argon2 iteration count for PIN hashing.
pub const DEFAULT_PIN_HASH_ITERATIONS: u32 = 2;

/// Argon2 lanes for PIN hashing.
pub const DEFAULT_PIN_HASH_PARALLELISM: u32 = 1;

/// Default `max_players` for close-quarters (CS) matches.
pub const DEFAULT_CS_MAX_PLAYERS: u32 = 2;

/// Default `max_players` for battle-royale (BR) matches.
pub const DEFAULT_BR_MAX_PLAYERS: u32 = 52;

/// Length of generated room codes.
pub const ROOM_CODE_LEN: usize = 6;

/// Longest room code a creator may supply.
pub const MAX_ROOM_CODE_LEN: usize = 32;

/// Attempts at drawing an unused room code before giving up.
pub const ROOM_CODE_ATTEMPTS: usize = 16;

/// Radius of the proximity filter in match discovery.
pub const DEFAULT_DISCOVERY_RADIUS_KM: f64 = 50.0;

/// Mean Earth radius used by the haversine distance.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Smallest amount accepted for top-ups, withdrawals and redemptions.
pub const MIN_CASH_AMOUNT: i64 = 1;

/// Environment variable holding the hex-encoded field encryption key.
pub const ENV_ENCRYPTION_KEY: &str = "WALLET_ENCRYPTION_KEY";

/// Environment variable holding the tracing filter directive.
pub const ENV_LOG_FILTER: &str = "RIVALRY_LOG";

/// Environment variable switching the log formatter to JSON.
pub const ENV_LOG_JSON: &str = "RIVALRY_LOG_JSON";

/// Environment variable with the UTC offset of displayed match times.
pub const ENV_SCHEDULE_OFFSET: &str = "RIVALRY_SCHEDULE_UTC_OFFSET_MINUTES";

/// Environment variable overriding the discovery radius.
pub const ENV_DISCOVERY_RADIUS: &str = "RIVALRY_DISCOVERY_RADIUS_KM";

/// Default tracing filter.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
