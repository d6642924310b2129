//! Error types for the Rivalry backend.
//!
//! All errors use the `RV_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Wallet / ledger errors
//! - 2xx: Match errors
//! - 3xx: Authorization errors
//! - 4xx: Validation errors
//! - 5xx: Concurrency / storage errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{BalanceKind, MatchId, MatchStatus, RoomCode, UserId, WalletId};

/// Coarse classification of an error, independent of the concrete variant.
///
/// Outer layers (HTTP, RPC) map these onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    InvalidState,
    InsufficientFunds,
    Validation,
    Conflict,
    Internal,
}

/// Central error enum for all Rivalry operations.
#[derive(Debug, Error)]
pub enum RivalryError {
    // =================================================================
    // Wallet / Ledger Errors (1xx)
    // =================================================================
    /// No wallet exists for this user.
    #[error("RV_ERR_100: Wallet not found for user {0}")]
    WalletNotFound(UserId),

    /// The user already has a wallet.
    #[error("RV_ERR_101: Wallet already initialized for user {0}")]
    WalletExists(UserId),

    /// A debit would leave a balance negative.
    #[error("RV_ERR_102: Insufficient {balance} balance: need {needed}, have {available}")]
    InsufficientFunds {
        balance: BalanceKind,
        needed: Decimal,
        available: Decimal,
    },

    /// No wallet matches the supplied account number.
    #[error("RV_ERR_103: Receiver wallet not found")]
    ReceiverNotFound,

    /// Sender and receiver resolve to the same wallet.
    #[error("RV_ERR_104: Cannot send gift to your own wallet")]
    SelfGift,

    /// Could not allocate an unused account number.
    #[error("RV_ERR_105: Account number space exhausted after {attempts} attempts")]
    AccountNumberExhausted { attempts: usize },

    /// A payment order was already credited.
    #[error("RV_ERR_106: Payment order already credited: {0}")]
    DuplicateOrder(String),

    /// The gateway reported the order as unpaid.
    #[error("RV_ERR_107: Payment verification failed for order {0}")]
    PaymentNotCompleted(String),

    /// A stored field could not be decrypted.
    #[error("RV_ERR_108: Decryption failed: {reason}")]
    Decryption { reason: String },

    /// No wallet has this id.
    #[error("RV_ERR_109: No wallet with id {0}")]
    UnknownWallet(WalletId),

    /// A payment order belongs to another user.
    #[error("RV_ERR_110: Payment order {0} was not opened by this user")]
    ForeignOrder(String),

    // =================================================================
    // Match Errors (2xx)
    // =================================================================
    /// No match with this id.
    #[error("RV_ERR_200: Match not found: {0}")]
    MatchNotFound(MatchId),

    /// No match with this room code.
    #[error("RV_ERR_201: No match for room code {0}")]
    RoomNotFound(RoomCode),

    /// All slots are taken.
    #[error("RV_ERR_202: Match is full ({max_players} players)")]
    MatchFull { max_players: u32 },

    /// The user is already a participant.
    #[error("RV_ERR_203: User {0} already joined this match")]
    AlreadyJoined(UserId),

    /// Another match already uses this room code.
    #[error("RV_ERR_204: Room code already in use: {0}")]
    DuplicateRoomCode(RoomCode),

    /// The operation is illegal for the current match state.
    #[error("RV_ERR_205: Invalid state: {reason}")]
    InvalidState { reason: String },

    /// A status transition would move the match backwards.
    #[error("RV_ERR_206: Illegal status transition {from} -> {to}")]
    IllegalTransition { from: MatchStatus, to: MatchStatus },

    // =================================================================
    // Authorization Errors (3xx)
    // =================================================================
    /// The caller lacks ownership or role for this operation.
    #[error("RV_ERR_300: Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// The wallet PIN did not verify.
    #[error("RV_ERR_301: Invalid wallet PIN")]
    InvalidPin,

    // =================================================================
    // Validation Errors (4xx)
    // =================================================================
    /// Malformed input.
    #[error("RV_ERR_400: Validation failed: {reason}")]
    Validation { reason: String },

    /// The OTP is missing or does not match.
    #[error("RV_ERR_401: Invalid OTP")]
    InvalidOtp,

    /// The OTP is past its expiry.
    #[error("RV_ERR_402: OTP has expired")]
    OtpExpired,

    // =================================================================
    // Concurrency / Storage Errors (5xx)
    // =================================================================
    /// A row changed between read and write.
    #[error("RV_ERR_500: Version conflict on {entity}")]
    VersionConflict { entity: String },

    /// Optimistic retries exhausted under contention.
    #[error("RV_ERR_501: Too much contention on {entity} after {attempts} attempts")]
    Contention { entity: String, attempts: u32 },

    /// A unique index rejected the write.
    #[error("RV_ERR_502: Unique constraint violated: {index}")]
    UniqueViolation { index: String },

    /// The backing store failed.
    #[error("RV_ERR_503: Storage error: {0}")]
    Storage(String),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("RV_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("RV_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (missing key, bad value).
    #[error("RV_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl RivalryError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WalletNotFound(_)
            | Self::UnknownWallet(_)
            | Self::ReceiverNotFound
            | Self::MatchNotFound(_)
            | Self::RoomNotFound(_) => ErrorKind::NotFound,
            Self::Unauthorized { .. } | Self::InvalidPin | Self::ForeignOrder(_) => {
                ErrorKind::Unauthorized
            }
            Self::InvalidState { .. }
            | Self::IllegalTransition { .. }
            | Self::PaymentNotCompleted(_) => ErrorKind::InvalidState,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::Validation { .. } | Self::InvalidOtp | Self::OtpExpired => ErrorKind::Validation,
            Self::WalletExists(_)
            | Self::SelfGift
            | Self::DuplicateOrder(_)
            | Self::MatchFull { .. }
            | Self::AlreadyJoined(_)
            | Self::DuplicateRoomCode(_)
            | Self::VersionConflict { .. }
            | Self::UniqueViolation { .. } => ErrorKind::Conflict,
            Self::AccountNumberExhausted { .. }
            | Self::Decryption { .. }
            | Self::Contention { .. }
            | Self::Storage(_)
            | Self::Internal(_)
            | Self::Serialization(_)
            | Self::Configuration(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a `Validation` error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Shorthand for an `Unauthorized` error.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Shorthand for an `InvalidState` error.
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, RivalryError>;

impl From<serde_json::Error> for RivalryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Failure of a fire-and-forget side effect (notification, email).
///
/// Never surfaced to the caller of the operation that triggered it.
#[derive(Debug, Error)]
#[error("dispatch to {channel} failed: {reason}")]
pub struct DispatchError {
    pub channel: &'static str,
    pub reason: String,
}

impl DispatchError {
    pub fn new(channel: &'static str, reason: impl Into<String>) -> Self {
        Self {
            channel,
            reason: reason.into(),
        }
    }
}
