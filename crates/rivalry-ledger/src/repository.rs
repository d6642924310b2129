//! Wallet and transaction persistence.
//!
//! [`LedgerRepository`] is the seam to the backing store. Every wallet row
//! carries a `version`; [`LedgerRepository::commit`] applies a batch of row
//! updates, new transaction records and settlements atomically, and only if
//! every row is still at the version the caller read. A stale version
//! fails the whole batch with `VersionConflict` so the caller can re-read
//! and retry.
//!
//! [`MemoryLedgerStore`] is the in-process backend used by the node and by
//! tests.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use rivalry_types::{
    Result, RivalryError, Transaction, TransactionId, TransactionStatus, UserId, WalletId,
    WalletRecord,
};

/// One atomic unit of ledger writes.
#[derive(Debug, Clone, Default)]
pub struct LedgerCommit {
    /// Updated rows, each still carrying the version that was read.
    pub wallets: Vec<WalletRecord>,
    /// Audit records appended alongside the row updates.
    pub transactions: Vec<Transaction>,
    /// Status changes on existing `PENDING` transactions.
    pub settlements: Vec<(TransactionId, TransactionStatus)>,
}

impl LedgerCommit {
    #[must_use]
    pub fn new(wallets: Vec<WalletRecord>, transactions: Vec<Transaction>) -> Self {
        Self {
            wallets,
            transactions,
            settlements: Vec::new(),
        }
    }
}

pub trait LedgerRepository: Send + Sync {
    /// Insert a new wallet at version 1.
    ///
    /// # Errors
    /// `WalletExists` if the user already has one; `UniqueViolation` if the
    /// account-number hash is taken.
    fn insert_wallet(&self, wallet: WalletRecord) -> Result<WalletRecord>;

    fn wallet_by_user(&self, user_id: UserId) -> Result<Option<WalletRecord>>;

    fn wallet_by_id(&self, id: WalletId) -> Result<Option<WalletRecord>>;

    fn wallet_by_account_hash(&self, hash: &str) -> Result<Option<WalletRecord>>;

    /// Every wallet row.
    fn wallets(&self) -> Result<Vec<WalletRecord>>;

    /// Apply a [`LedgerCommit`] all-or-nothing. Returns the stored rows in
    /// the order given, with bumped versions.
    fn commit(&self, commit: LedgerCommit) -> Result<Vec<WalletRecord>>;

    /// A user's transactions, newest first.
    fn transactions_for(&self, user_id: UserId) -> Result<Vec<Transaction>>;

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>>;

    /// The transaction recording a payment-gateway order, if any.
    fn transaction_by_order(&self, order_id: &str) -> Result<Option<Transaction>>;
}

#[derive(Debug, Default)]
struct Tables {
    wallets: HashMap<WalletId, WalletRecord>,
    by_user: HashMap<UserId, WalletId>,
    by_account_hash: HashMap<String, WalletId>,
    transactions: Vec<Transaction>,
    tx_index: HashMap<TransactionId, usize>,
}

/// In-memory [`LedgerRepository`].
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    tables: RwLock<Tables>,
}

impl MemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| RivalryError::Storage("ledger tables lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| RivalryError::Storage("ledger tables lock poisoned".into()))
    }

    /// Overwrite a row without a version check. Simulates legacy data.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn put_raw(&self, wallet: WalletRecord) -> Result<()> {
        let mut t = self.write()?;
        t.by_user.insert(wallet.user_id, wallet.id);
        t.by_account_hash.retain(|_, id| *id != wallet.id);
        if let Some(hash) = &wallet.account_number_hash {
            t.by_account_hash.insert(hash.clone(), wallet.id);
        }
        t.wallets.insert(wallet.id, wallet);
        Ok(())
    }
}

impl Tables {
    fn check(&self, commit: &LedgerCommit) -> Result<()> {
        for (i, row) in commit.wallets.iter().enumerate() {
            if commit.wallets[..i].iter().any(|w| w.id == row.id) {
                return Err(RivalryError::Internal(format!(
                    "{} appears twice in one commit",
                    row.id
                )));
            }
            let stored = self
                .wallets
                .get(&row.id)
                .ok_or(RivalryError::WalletNotFound(row.user_id))?;
            if stored.version != row.version {
                return Err(RivalryError::VersionConflict {
                    entity: row.id.to_string(),
                });
            }
            if let Some(hash) = &row.account_number_hash {
                if self.by_account_hash.get(hash).is_some_and(|owner| *owner != row.id) {
                    return Err(RivalryError::UniqueViolation {
                        index: "account_number_hash".into(),
                    });
                }
            }
        }
        for (id, status) in &commit.settlements {
            let tx = self
                .tx_index
                .get(id)
                .and_then(|&i| self.transactions.get(i))
                .ok_or_else(|| RivalryError::invalid_state(format!("unknown transaction {id}")))?;
            if !tx.status.can_transition_to(*status) {
                return Err(RivalryError::invalid_state(format!(
                    "Cannot move transaction {id} from {} to {status}",
                    tx.status
                )));
            }
        }
        Ok(())
    }
}

impl LedgerRepository for MemoryLedgerStore {
    fn insert_wallet(&self, mut wallet: WalletRecord) -> Result<WalletRecord> {
        let mut t = self.write()?;
        if t.by_user.contains_key(&wallet.user_id) {
            return Err(RivalryError::WalletExists(wallet.user_id));
        }
        if let Some(hash) = &wallet.account_number_hash {
            if t.by_account_hash.contains_key(hash) {
                return Err(RivalryError::UniqueViolation {
                    index: "account_number_hash".into(),
                });
            }
            t.by_account_hash.insert(hash.clone(), wallet.id);
        }
        wallet.version = 1;
        t.by_user.insert(wallet.user_id, wallet.id);
        t.wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }

    fn wallet_by_user(&self, user_id: UserId) -> Result<Option<WalletRecord>> {
        let t = self.read()?;
        Ok(t.by_user.get(&user_id).and_then(|id| t.wallets.get(id)).cloned())
    }

    fn wallet_by_id(&self, id: WalletId) -> Result<Option<WalletRecord>> {
        Ok(self.read()?.wallets.get(&id).cloned())
    }

    fn wallet_by_account_hash(&self, hash: &str) -> Result<Option<WalletRecord>> {
        let t = self.read()?;
        Ok(t.by_account_hash.get(hash).and_then(|id| t.wallets.get(id)).cloned())
    }

    fn wallets(&self) -> Result<Vec<WalletRecord>> {
        Ok(self.read()?.wallets.values().cloned().collect())
    }

    fn commit(&self, commit: LedgerCommit) -> Result<Vec<WalletRecord>> {
        let mut t = self.write()?;
        t.check(&commit)?;

        let now = Utc::now();
        let mut stored = Vec::with_capacity(commit.wallets.len());
        for mut row in commit.wallets {
            row.version += 1;
            row.updated_at = now;
            let previous_hash = t
                .wallets
                .get(&row.id)
                .and_then(|w| w.account_number_hash.clone());
            if previous_hash != row.account_number_hash {
                if let Some(old) = previous_hash {
                    t.by_account_hash.remove(&old);
                }
                if let Some(new) = &row.account_number_hash {
                    t.by_account_hash.insert(new.clone(), row.id);
                }
            }
            t.wallets.insert(row.id, row.clone());
            stored.push(row);
        }

        for (id, status) in commit.settlements {
            if let Some(i) = t.tx_index.get(&id).copied() {
                t.transactions[i].status = status;
            }
        }

        for tx in commit.transactions {
            let i = t.transactions.len();
            t.tx_index.insert(tx.id, i);
            t.transactions.push(tx);
        }

        Ok(stored)
    }

    fn transactions_for(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        Ok(self
            .read()?
            .transactions
            .iter()
            .rev()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect())
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let t = self.read()?;
        Ok(t.tx_index.get(&id).and_then(|&i| t.transactions.get(i)).cloned())
    }

    fn transaction_by_order(&self, order_id: &str) -> Result<Option<Transaction>> {
        Ok(self
            .read()?
            .transactions
            .iter()
            .rev()
            .find(|tx| tx.order_id.as_deref() == Some(order_id))
            .cloned())
    }
}
