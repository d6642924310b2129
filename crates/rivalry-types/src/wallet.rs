//! Wallet types for the Rivalry escrow model.
//!
//! Every user has at most one wallet with three balances:
//! `available` (spendable), `locked` (reserved as match entry fees) and
//! `withdrawable` (eligible for external payout).
//!
//! [`WalletRecord`] is the stored shape: balances and the account number
//! are encrypted tokens. [`WalletView`] is the decrypted projection handed
//! back to callers.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{constants, RivalryError, Result, UserId, WalletId};

/// Which of the three wallet balances an operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceKind {
    Available,
    Locked,
    Withdrawable,
}

impl fmt::Display for BalanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Locked => write!(f, "locked"),
            Self::Withdrawable => write!(f, "withdrawable"),
        }
    }
}

/// A wallet row as persisted. Sensitive fields hold encrypted tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    pub id: WalletId,
    /// Owning user. Immutable; unique across wallets.
    pub user_id: UserId,
    /// Encrypted 10-digit account number.
    pub account_number: String,
    /// SHA-256 hex of the plaintext account number, for equality lookup.
    /// `None` on legacy rows until the hash backfill has run.
    pub account_number_hash: Option<String>,
    /// Salted one-way hash of the 6-digit PIN.
    pub pin_hash: String,
    /// Encrypted decimal strings.
    pub available_balance: String,
    pub locked_balance: String,
    pub withdrawable_balance: String,
    /// Bumped by the store on every successful write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Decrypted balances of a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balances {
    pub available: Decimal,
    pub locked: Decimal,
    pub withdrawable: Decimal,
}

impl Balances {
    /// Balance of one kind.
    #[must_use]
    pub fn get(&self, kind: BalanceKind) -> Decimal {
        match kind {
            BalanceKind::Available => self.available,
            BalanceKind::Locked => self.locked,
            BalanceKind::Withdrawable => self.withdrawable,
        }
    }

    /// Whether every balance is non-negative.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.available >= Decimal::ZERO
            && self.locked >= Decimal::ZERO
            && self.withdrawable >= Decimal::ZERO
    }

    /// Subtract `amount` from one balance.
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if the balance would go negative;
    /// `self` is left unchanged.
    pub fn debit(&mut self, kind: BalanceKind, amount: Decimal) -> Result<()> {
        let current = self.get(kind);
        if current < amount {
            return Err(RivalryError::InsufficientFunds {
                balance: kind,
                needed: amount,
                available: current,
            });
        }
        *self.slot(kind) -= amount;
        Ok(())
    }

    /// Add `amount` to one balance.
    ///
    /// # Errors
    /// Returns `Validation` if the sum is not representable;
    /// `self` is left unchanged.
    pub fn credit(&mut self, kind: BalanceKind, amount: Decimal) -> Result<()> {
        let slot = self.slot(kind);
        *slot = slot.checked_add(amount).ok_or_else(|| {
            RivalryError::validation(format!("Amount {amount} overflows the {kind} balance"))
        })?;
        Ok(())
    }

    fn slot(&mut self, kind: BalanceKind) -> &mut Decimal {
        match kind {
            BalanceKind::Available => &mut self.available,
            BalanceKind::Locked => &mut self.locked,
            BalanceKind::Withdrawable => &mut self.withdrawable,
        }
    }
}

/// Decrypted wallet as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletView {
    pub id: WalletId,
    pub user_id: UserId,
    pub account_number: String,
    #[serde(flatten)]
    pub balances: Balances,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WalletView {
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.balances.available
    }

    #[must_use]
    pub fn locked(&self) -> Decimal {
        self.balances.locked
    }

    #[must_use]
    pub fn withdrawable(&self) -> Decimal {
        self.balances.withdrawable
    }
}

/// Input for wallet initialisation.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeWallet {
    pub pin: String,
    pub confirm_pin: String,
}

impl InitializeWallet {
    /// Check that both PINs are present, equal, and well-formed.
    ///
    /// # Errors
    /// Returns `Validation` describing the first failed check.
    pub fn validate(&self) -> Result<&str> {
        if self.pin.is_empty() || self.confirm_pin.is_empty() {
            return Err(RivalryError::validation("PIN and Confirm PIN are required"));
        }
        if self.pin != self.confirm_pin {
            return Err(RivalryError::validation("PINs do not match"));
        }
        validate_pin(&self.pin)?;
        Ok(&self.pin)
    }
}

/// A PIN is exactly [`constants::PIN_LENGTH`] ASCII digits.
///
/// # Errors
/// Returns `Validation` otherwise.
pub fn validate_pin(pin: &str) -> Result<()> {
    if pin.len() != constants::PIN_LENGTH || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RivalryError::validation(format!(
            "PIN must be exactly {} digits",
            constants::PIN_LENGTH
        )));
    }
    Ok(())
}

/// Ledger amounts must be non-negative.
///
/// # Errors
/// Returns `Validation` for negative amounts.
pub fn validate_amount(amount: Decimal) -> Result<()> {
    if amount < Decimal::ZERO {
        return Err(RivalryError::validation(format!(
            "Amount must be non-negative, got {amount}"
        )));
    }
    Ok(())
}

/// Cash movements (top-up, withdrawal, redemption) need at least
/// [`constants::MIN_CASH_AMOUNT`].
///
/// # Errors
/// Returns `Validation` for smaller amounts.
pub fn validate_cash_amount(amount: Decimal) -> Result<()> {
    if amount < Decimal::from(constants::MIN_CASH_AMOUNT) {
        return Err(RivalryError::validation("Invalid amount"));
    }
    Ok(())
}
