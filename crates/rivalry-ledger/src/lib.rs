//! # rivalry-ledger
//!
//! Escrow wallet ledger for Rivalry.
//!
//! - [`codec`]: field encryption of balances and account numbers
//! - [`pin`]: Argon2id PIN hashing
//! - [`repository`]: storage seam with optimistic versioned commits
//! - [`ledger`]: every balance-changing operation, each paired with its
//!   audit record
//! - [`migration`]: deploy-time account-hash backfill
//! - [`pin_reset`]: emailed OTP flow for forgotten PINs
//! - [`topup`]: payment-gateway funding of deposits

pub mod codec;
pub mod idempotency;
pub mod ledger;
pub mod migration;
pub mod pin;
pub mod pin_reset;
pub mod repository;
pub mod topup;

pub use codec::{account_hash, FieldCipher};
pub use idempotency::IdempotencyGuard;
pub use ledger::{Adjustment, DepositSource, Ledger, Payout};
pub use migration::{migrate_account_hashes, MigrationReport};
pub use pin::PinHasher;
pub use pin_reset::PinReset;
pub use repository::{LedgerCommit, LedgerRepository, MemoryLedgerStore};
pub use topup::{OrderRef, OrderRequest, PaymentGateway, TopUp, Verification};
