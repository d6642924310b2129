//! Ledger transaction records: the append-only audit trail.
//!
//! Every balance mutation produces exactly one [`Transaction`] per wallet
//! touched. Amounts are stored positive; direction is implied by
//! [`TransactionType`]. Records are immutable apart from the
//! `PENDING → SUCCESS | FAILED` settlement of asynchronous payouts.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MatchId, RivalryError, Result, TransactionId, UserId};

/// What kind of balance movement a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    Lock,
    Unlock,
    GiftSent,
    GiftReceived,
    Redeem,
    EntryFee,
    PrizeWon,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deposit => write!(f, "DEPOSIT"),
            Self::Withdraw => write!(f, "WITHDRAW"),
            Self::Lock => write!(f, "LOCK"),
            Self::Unlock => write!(f, "UNLOCK"),
            Self::GiftSent => write!(f, "GIFT_SENT"),
            Self::GiftReceived => write!(f, "GIFT_RECEIVED"),
            Self::Redeem => write!(f, "REDEEM"),
            Self::EntryFee => write!(f, "ENTRY_FEE"),
            Self::PrizeWon => write!(f, "PRIZE_WON"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionCategory {
    Wallet,
    Game,
    Gift,
    Refund,
}

/// Settlement state of a transaction.
///
/// Only `Pending` may change, and only to `Success` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Pending, Self::Success | Self::Failed))
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    /// Always non-negative.
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub category: TransactionCategory,
    pub status: TransactionStatus,
    pub match_id: Option<MatchId>,
    /// External payment-gateway order reference.
    pub order_id: Option<String>,
    /// External payment-gateway payment reference.
    pub payment_id: Option<String>,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// A successful transaction with no references.
    #[must_use]
    pub fn new(
        user_id: UserId,
        amount: Decimal,
        tx_type: TransactionType,
        category: TransactionCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            user_id,
            amount,
            tx_type,
            category,
            status: TransactionStatus::Success,
            match_id: None,
            order_id: None,
            payment_id: None,
            description: description.into(),
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_match(mut self, match_id: Option<MatchId>) -> Self {
        self.match_id = match_id;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_payment_refs(mut self, order_id: Option<String>, payment_id: Option<String>) -> Self {
        self.order_id = order_id;
        self.payment_id = payment_id;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Settle a pending transaction.
    ///
    /// # Errors
    /// Returns `InvalidState` unless the transaction is `Pending` and the
    /// target is `Success` or `Failed`.
    pub fn settle(&mut self, status: TransactionStatus) -> Result<()> {
        if !self.status.can_transition_to(status) {
            return Err(RivalryError::invalid_state(format!(
                "Cannot move transaction {} from {} to {status}",
                self.id, self.status
            )));
        }
        self.status = status;
        Ok(())
    }
}
