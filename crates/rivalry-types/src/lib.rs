//! # rivalry-types
//!
//! Shared types, errors, and configuration for the **Rivalry** backend.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`UserId`], [`WalletId`], [`MatchId`], [`TransactionId`], [`RoomCode`]
//! - **Wallet model**: [`WalletRecord`], [`WalletView`], [`BalanceKind`], [`InitializeWallet`]
//! - **Transaction model**: [`Transaction`], [`TransactionType`], [`TransactionCategory`], [`TransactionStatus`]
//! - **Match model**: [`Match`], [`MatchStatus`], [`Participant`], [`MatchResult`], [`GameType`], [`Promotion`]
//! - **Callers**: [`Caller`], [`Role`]
//! - **Live updates**: [`MatchEvent`]
//! - **Side-effect hooks**: [`Mailer`], [`Notifier`]
//! - **Configuration**: [`Config`], [`LedgerConfig`], [`ArenaConfig`], [`LogConfig`]
//! - **Errors**: [`RivalryError`] with `RV_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod caller;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod hooks;
pub mod ids;
pub mod matches;
pub mod transaction;
pub mod wallet;

// Re-export all primary types at crate root for ergonomic imports:
//   use rivalry_types::{Match, MatchStatus, WalletView, ...};

pub use caller::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use hooks::{Audience, Discard, Email, Mailer, Notification, Notifier};
pub use ids::*;
pub use matches::*;
pub use transaction::*;
pub use wallet::*;

// Constants are accessed via `rivalry_types::constants::FOO`
// (not re-exported to avoid name collisions).
