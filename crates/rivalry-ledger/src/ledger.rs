//! Wallet ledger: the only code path that changes a balance.
//!
//! Each wallet holds three encrypted balances. Every operation is a
//! read-modify-write of one row (two for gifts) that is committed together
//! with its [`Transaction`] record in a single [`LedgerCommit`]:
//!
//! ```text
//!                 deposit / admin CREDIT
//!                        │
//!                        ▼
//!   redeem ◄──── available ──── lock_funds ────► locked ──── deduct_entry_fee ──► (spent)
//!                    ▲   ▲ ◄─── unlock_funds ────┘
//!                    │   └── gift (sender → receiver)
//!   award_prize ─────┴──────► withdrawable ──── withdraw ──► (payout, PENDING)
//! ```
//!
//! A concurrent writer that moves the row version forces a re-read and
//! another attempt, so no interleaving can drive a balance below zero.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rivalry_types::constants::{ACCOUNT_NUMBER_LEN, ACCOUNT_NUMBER_PREFIX};
use rivalry_types::{
    validate_amount, validate_cash_amount, validate_pin, BalanceKind, Balances, Caller,
    InitializeWallet, LedgerConfig, MatchId, Result, RivalryError, Transaction,
    TransactionCategory, TransactionId, TransactionStatus, TransactionType, UserId, WalletId,
    WalletRecord, WalletView,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::codec::{account_hash, FieldCipher};
use crate::pin::PinHasher;
use crate::repository::{LedgerCommit, LedgerRepository};

/// Direction of an admin balance adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Adjustment {
    Credit,
    Debit,
}

/// Summary of where a user's last successful deposit came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositSource {
    pub source: String,
    pub details: String,
}

/// Result of a withdrawal request: the updated wallet and the pending
/// payout record.
#[derive(Debug, Clone)]
pub struct Payout {
    pub wallet: WalletView,
    pub transaction: Transaction,
}

pub struct Ledger {
    store: Arc<dyn LedgerRepository>,
    cipher: FieldCipher,
    pins: PinHasher,
    config: LedgerConfig,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// # Errors
    /// Returns `Configuration` if the PIN hashing parameters are invalid.
    pub fn new(
        store: Arc<dyn LedgerRepository>,
        cipher: FieldCipher,
        config: LedgerConfig,
    ) -> Result<Self> {
        let pins = PinHasher::new(&config.pin_hash)?;
        Ok(Self {
            store,
            cipher,
            pins,
            config,
        })
    }

    #[must_use]
    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // =================================================================
    // Wallet lifecycle
    // =================================================================

    /// Create a user's wallet with all balances at zero.
    ///
    /// # Errors
    /// - `Validation` for a malformed PIN
    /// - `WalletExists` if the user already has a wallet
    /// - `AccountNumberExhausted` if no free account number was drawn
    pub fn create_wallet(&self, user_id: UserId, pin: &str) -> Result<WalletView> {
        validate_pin(pin)?;
        if self.store.wallet_by_user(user_id)?.is_some() {
            return Err(RivalryError::WalletExists(user_id));
        }

        let pin_hash = self.pins.hash(pin)?;
        let zero = self.cipher.encrypt_amount(Decimal::ZERO)?;
        let attempts = self.config.account_number_attempts;

        for _ in 0..attempts {
            let number = generate_account_number();
            let hash = account_hash(&number);
            if self.store.wallet_by_account_hash(&hash)?.is_some() {
                continue;
            }

            let now = Utc::now();
            let record = WalletRecord {
                id: WalletId::new(),
                user_id,
                account_number: self.cipher.encrypt(&number)?,
                account_number_hash: Some(hash),
                pin_hash: pin_hash.clone(),
                available_balance: zero.clone(),
                locked_balance: zero.clone(),
                withdrawable_balance: zero.clone(),
                version: 0,
                created_at: now,
                updated_at: now,
            };

            match self.store.insert_wallet(record) {
                Ok(row) => {
                    tracing::info!(user = %user_id, wallet = %row.id, "Wallet created");
                    return self.view(&row);
                }
                Err(RivalryError::UniqueViolation { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        Err(RivalryError::AccountNumberExhausted { attempts })
    }

    /// Validate the initialisation input, then [`Ledger::create_wallet`].
    pub fn initialize_wallet(&self, user_id: UserId, input: &InitializeWallet) -> Result<WalletView> {
        let pin = input.validate()?;
        self.create_wallet(user_id, pin)
    }

    /// # Errors
    /// `WalletNotFound` or `InvalidPin`.
    pub fn verify_pin(&self, user_id: UserId, pin: &str) -> Result<()> {
        let record = self.load(user_id)?;
        if self.pins.verify(pin, &record.pin_hash) {
            Ok(())
        } else {
            Err(RivalryError::InvalidPin)
        }
    }

    /// Replace the PIN hash. Does not touch balances, so no transaction is
    /// logged.
    pub(crate) fn set_pin(&self, user_id: UserId, new_pin: &str) -> Result<()> {
        validate_pin(new_pin)?;
        let pin_hash = self.pins.hash(new_pin)?;
        let attempts = self.config.max_write_retries;
        for attempt in 1..=attempts {
            let mut record = self.load(user_id)?;
            record.pin_hash.clone_from(&pin_hash);
            match self.store.commit(LedgerCommit::new(vec![record], Vec::new())) {
                Ok(_) => {
                    tracing::info!(user = %user_id, "Wallet PIN replaced");
                    return Ok(());
                }
                Err(RivalryError::VersionConflict { .. }) => {
                    tracing::debug!(user = %user_id, attempt, "Wallet moved during PIN reset; retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(RivalryError::Contention {
            entity: format!("wallet of {user_id}"),
            attempts,
        })
    }

    // =================================================================
    // Reads
    // =================================================================

    pub fn has_wallet(&self, user_id: UserId) -> Result<bool> {
        Ok(self.store.wallet_by_user(user_id)?.is_some())
    }

    /// Decrypted wallet of a user.
    ///
    /// # Errors
    /// `WalletNotFound` if the user has no wallet.
    pub fn balance(&self, user_id: UserId) -> Result<WalletView> {
        self.view(&self.load(user_id)?)
    }

    /// Transaction history, newest first.
    pub fn transactions(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        self.store.transactions_for(user_id)
    }

    /// Where the most recent successful deposit came from, if any.
    pub fn last_deposit_source(&self, user_id: UserId) -> Result<Option<DepositSource>> {
        let last = self
            .store
            .transactions_for(user_id)?
            .into_iter()
            .find(|tx| tx.tx_type == TransactionType::Deposit && tx.status == TransactionStatus::Success);

        Ok(last.map(|tx| DepositSource {
            source: "Original Payment Method".to_string(),
            details: tx
                .payment_id
                .as_deref()
                .map_or_else(|| "Linked Account".to_string(), |p| format!("Ref: {}", last_chars(p, 4))),
        }))
    }

    /// Resolve an account number to its owner.
    pub fn wallet_owner(&self, account_number: &str) -> Result<Option<UserId>> {
        Ok(self
            .store
            .wallet_by_account_hash(&account_hash(account_number.trim()))?
            .map(|w| w.user_id))
    }

    /// The gateway deposit already recorded for an order, if any.
    pub fn deposit_for_order(&self, order_id: &str) -> Result<Option<Transaction>> {
        self.store.transaction_by_order(order_id)
    }

    /// Sum of every wallet's balances. Admin only.
    pub fn ledger_totals(&self, caller: &Caller) -> Result<Balances> {
        caller.require_admin()?;
        let mut totals = Balances::default();
        for record in self.store.wallets()? {
            let b = self.balances_of(&record);
            totals.available += b.available;
            totals.locked += b.locked;
            totals.withdrawable += b.withdrawable;
        }
        Ok(totals)
    }

    // =================================================================
    // Mutations
    // =================================================================

    pub fn deposit(&self, user_id: UserId, amount: Decimal) -> Result<WalletView> {
        self.deposit_with_refs(user_id, amount, None, None)
    }

    /// Credit `available`, tagging the record with gateway references.
    pub fn deposit_with_refs(
        &self,
        user_id: UserId,
        amount: Decimal,
        order_id: Option<String>,
        payment_id: Option<String>,
    ) -> Result<WalletView> {
        validate_amount(amount)?;
        let (wallet, _) = self.apply(user_id, |b| {
            b.credit(BalanceKind::Available, amount)?;
            Ok(Transaction::new(
                user_id,
                amount,
                TransactionType::Deposit,
                TransactionCategory::Wallet,
                "Cash added to wallet",
            )
            .with_payment_refs(order_id.clone(), payment_id.clone()))
        })?;
        Ok(wallet)
    }

    /// Reserve `amount` of available funds as an entry fee.
    ///
    /// # Errors
    /// `InsufficientFunds` if `available < amount`.
    pub fn lock_funds(&self, user_id: UserId, amount: Decimal, match_id: Option<MatchId>) -> Result<WalletView> {
        validate_amount(amount)?;
        let (wallet, _) = self.apply(user_id, |b| {
            b.debit(BalanceKind::Available, amount)?;
            b.credit(BalanceKind::Locked, amount)?;
            Ok(Transaction::new(
                user_id,
                amount,
                TransactionType::Lock,
                TransactionCategory::Game,
                "Locked entry fee for match join",
            )
            .with_match(match_id))
        })?;
        Ok(wallet)
    }

    /// Return locked funds to `available`.
    ///
    /// # Errors
    /// `InsufficientFunds` if `locked < amount`.
    pub fn unlock_funds(
        &self,
        user_id: UserId,
        amount: Decimal,
        match_id: Option<MatchId>,
        reason: &str,
    ) -> Result<WalletView> {
        validate_amount(amount)?;
        let (wallet, _) = self.apply(user_id, |b| {
            b.debit(BalanceKind::Locked, amount)?;
            b.credit(BalanceKind::Available, amount)?;
            Ok(Transaction::new(
                user_id,
                amount,
                TransactionType::Unlock,
                TransactionCategory::Game,
                format!("Unlock funds: {reason}"),
            )
            .with_match(match_id))
        })?;
        Ok(wallet)
    }

    /// Consume a locked entry fee. `available` already dropped at lock time.
    pub fn deduct_entry_fee(&self, user_id: UserId, amount: Decimal, match_id: MatchId) -> Result<WalletView> {
        validate_amount(amount)?;
        let (wallet, _) = self.apply(user_id, |b| {
            b.debit(BalanceKind::Locked, amount)?;
            Ok(Transaction::new(
                user_id,
                amount,
                TransactionType::EntryFee,
                TransactionCategory::Game,
                "Match entry fee confirmed",
            )
            .with_match(Some(match_id)))
        })?;
        Ok(wallet)
    }

    /// Credit a prize to both `available` and `withdrawable`.
    pub fn award_prize(&self, user_id: UserId, amount: Decimal, match_id: MatchId) -> Result<WalletView> {
        validate_amount(amount)?;
        let (wallet, _) = self.apply(user_id, |b| {
            b.credit(BalanceKind::Withdrawable, amount)?;
            b.credit(BalanceKind::Available, amount)?;
            Ok(Transaction::new(
                user_id,
                amount,
                TransactionType::PrizeWon,
                TransactionCategory::Game,
                "Prize won for match",
            )
            .with_match(Some(match_id)))
        })?;
        Ok(wallet)
    }

    /// Request an external payout. The record stays `PENDING` until
    /// [`Ledger::settle_withdrawal`].
    ///
    /// # Errors
    /// - `Validation` for amounts below 1 or a missing method
    /// - `InsufficientFunds` if `withdrawable` or `available` is short
    pub fn withdraw(
        &self,
        user_id: UserId,
        amount: Decimal,
        method: &str,
        details: serde_json::Value,
    ) -> Result<Payout> {
        validate_cash_amount(amount)?;
        let method = method.trim();
        if method.is_empty() {
            return Err(RivalryError::validation("Withdrawal method is required"));
        }

        let (wallet, transaction) = self.apply(user_id, |b| {
            b.debit(BalanceKind::Withdrawable, amount)?;
            b.debit(BalanceKind::Available, amount)?;
            Ok(Transaction::new(
                user_id,
                amount,
                TransactionType::Withdraw,
                TransactionCategory::Wallet,
                format!("Withdrawal request via {method}"),
            )
            .with_status(TransactionStatus::Pending)
            .with_metadata(serde_json::json!({ "method": method, "details": details })))
        })?;
        Ok(Payout { wallet, transaction })
    }

    /// Record the outcome of a payout. A failed payout refunds the amount
    /// to `withdrawable` and `available` in the same commit. Admin only.
    ///
    /// # Errors
    /// `InvalidState` unless `transaction_id` is a `PENDING` withdrawal.
    pub fn settle_withdrawal(
        &self,
        caller: &Caller,
        transaction_id: TransactionId,
        outcome: TransactionStatus,
    ) -> Result<Transaction> {
        caller.require_admin()?;
        let mut payout = self
            .store
            .transaction(transaction_id)?
            .filter(|tx| tx.tx_type == TransactionType::Withdraw)
            .ok_or_else(|| RivalryError::invalid_state(format!("{transaction_id} is not a withdrawal")))?;
        payout.settle(outcome)?;

        let user_id = payout.user_id;
        let attempts = self.config.max_write_retries;
        for attempt in 1..=attempts {
            let record = self.load(user_id)?;
            let mut commit = LedgerCommit {
                settlements: vec![(transaction_id, outcome)],
                ..LedgerCommit::default()
            };
            if outcome == TransactionStatus::Failed {
                let mut balances = self.balances_of(&record);
                balances.credit(BalanceKind::Withdrawable, payout.amount)?;
                balances.credit(BalanceKind::Available, payout.amount)?;
                commit.wallets.push(self.seal(record, &balances)?);
                commit.transactions.push(
                    Transaction::new(
                        user_id,
                        payout.amount,
                        TransactionType::Deposit,
                        TransactionCategory::Refund,
                        "Refund of failed withdrawal",
                    )
                    .with_metadata(serde_json::json!({ "withdrawal": transaction_id })),
                );
            } else {
                commit.wallets.push(record);
            }

            match self.store.commit(commit) {
                Ok(_) => {
                    tracing::info!(
                        user = %user_id,
                        tx = %transaction_id,
                        outcome = %outcome,
                        "Withdrawal settled"
                    );
                    return Ok(payout);
                }
                Err(RivalryError::VersionConflict { .. }) => {
                    tracing::debug!(user = %user_id, attempt, "Wallet moved during settlement; retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(RivalryError::Contention {
            entity: format!("wallet of {user_id}"),
            attempts,
        })
    }

    /// Move `amount` of available funds to the wallet with account number
    /// `receiver_account_no`. Both rows and both records commit together.
    ///
    /// # Errors
    /// - `InvalidPin` for a wrong PIN
    /// - `ReceiverNotFound` if no wallet has that account number
    /// - `SelfGift` if it is the sender's own wallet
    /// - `InsufficientFunds` if the sender's `available` is short
    pub fn send_gift(
        &self,
        sender_id: UserId,
        receiver_account_no: &str,
        amount: Decimal,
        pin: &str,
    ) -> Result<WalletView> {
        validate_amount(amount)?;
        if amount.is_zero() {
            return Err(RivalryError::validation("Gift amount is required"));
        }
        self.verify_pin(sender_id, pin)?;

        let receiver_account_no = receiver_account_no.trim();
        let receiver_id = self
            .store
            .wallet_by_account_hash(&account_hash(receiver_account_no))?
            .ok_or(RivalryError::ReceiverNotFound)?
            .id;

        let attempts = self.config.max_write_retries;
        for attempt in 1..=attempts {
            let sender = self.load(sender_id)?;
            if sender.id == receiver_id {
                return Err(RivalryError::SelfGift);
            }
            let receiver = self
                .store
                .wallet_by_id(receiver_id)?
                .ok_or(RivalryError::ReceiverNotFound)?;

            let mut sender_balances = self.balances_of(&sender);
            sender_balances.debit(BalanceKind::Available, amount)?;
            let mut receiver_balances = self.balances_of(&receiver);
            receiver_balances.credit(BalanceKind::Available, amount)?;

            let receiver_user = receiver.user_id;
            let commit = LedgerCommit::new(
                vec![
                    self.seal(sender, &sender_balances)?,
                    self.seal(receiver, &receiver_balances)?,
                ],
                vec![
                    Transaction::new(
                        sender_id,
                        amount,
                        TransactionType::GiftSent,
                        TransactionCategory::Gift,
                        format!("Sent gift to {receiver_account_no}"),
                    ),
                    Transaction::new(
                        receiver_user,
                        amount,
                        TransactionType::GiftReceived,
                        TransactionCategory::Gift,
                        "Received gift from sender",
                    ),
                ],
            );

            match self.store.commit(commit) {
                Ok(rows) => {
                    tracing::info!(
                        sender = %sender_id,
                        receiver = %receiver_user,
                        amount = %amount,
                        "Gift transferred"
                    );
                    let sender_row = rows
                        .first()
                        .ok_or_else(|| RivalryError::Internal("commit returned no rows".into()))?;
                    return self.view(sender_row);
                }
                Err(RivalryError::VersionConflict { .. }) => {
                    tracing::debug!(sender = %sender_id, attempt, "Gift rows moved; retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(RivalryError::Contention {
            entity: format!("gift from {sender_id}"),
            attempts,
        })
    }

    /// Spend available funds in-app.
    pub fn redeem(&self, user_id: UserId, amount: Decimal) -> Result<WalletView> {
        validate_cash_amount(amount)?;
        let (wallet, _) = self.apply(user_id, |b| {
            b.debit(BalanceKind::Available, amount)?;
            Ok(Transaction::new(
                user_id,
                amount,
                TransactionType::Redeem,
                TransactionCategory::Wallet,
                "Redeemed wallet balance",
            ))
        })?;
        Ok(wallet)
    }

    /// Manual correction by an admin. A credit raises `available` and
    /// `withdrawable`; a debit lowers both and needs both to cover it.
    ///
    /// # Errors
    /// - `Unauthorized` for non-admins
    /// - `InsufficientFunds` on a debit either balance cannot cover
    pub fn admin_adjust(
        &self,
        caller: &Caller,
        wallet_id: WalletId,
        amount: Decimal,
        adjustment: Adjustment,
        reason: &str,
    ) -> Result<WalletView> {
        caller.require_admin()?;
        validate_amount(amount)?;
        let user_id = self
            .store
            .wallet_by_id(wallet_id)?
            .ok_or(RivalryError::UnknownWallet(wallet_id))?
            .user_id;

        let metadata = serde_json::json!({
            "admin_id": caller.user_id,
            "adjustment": adjustment,
            "reason": reason,
        });
        let (wallet, _) = self.apply(user_id, |b| {
            let tx_type = match adjustment {
                Adjustment::Credit => {
                    b.credit(BalanceKind::Available, amount)?;
                    b.credit(BalanceKind::Withdrawable, amount)?;
                    TransactionType::Deposit
                }
                Adjustment::Debit => {
                    b.debit(BalanceKind::Available, amount)?;
                    b.debit(BalanceKind::Withdrawable, amount)?;
                    TransactionType::Withdraw
                }
            };
            Ok(Transaction::new(
                user_id,
                amount,
                tx_type,
                TransactionCategory::Wallet,
                format!("Admin adjustment: {reason}"),
            )
            .with_metadata(metadata.clone()))
        })?;

        tracing::warn!(
            admin = %caller.user_id,
            wallet = %wallet_id,
            amount = %amount,
            adjustment = ?adjustment,
            "Admin balance adjustment applied"
        );
        Ok(wallet)
    }

    // =================================================================
    // Internals
    // =================================================================

    fn load(&self, user_id: UserId) -> Result<WalletRecord> {
        self.store
            .wallet_by_user(user_id)?
            .ok_or(RivalryError::WalletNotFound(user_id))
    }

    fn balances_of(&self, record: &WalletRecord) -> Balances {
        Balances {
            available: self.cipher.decrypt_amount(&record.available_balance),
            locked: self.cipher.decrypt_amount(&record.locked_balance),
            withdrawable: self.cipher.decrypt_amount(&record.withdrawable_balance),
        }
    }

    /// Re-encrypt balances into the row. Refuses to store a negative one.
    fn seal(&self, mut record: WalletRecord, balances: &Balances) -> Result<WalletRecord> {
        if !balances.is_consistent() {
            tracing::error!(user = %record.user_id, "Refusing to store a negative balance");
            return Err(RivalryError::Internal(format!(
                "negative balance computed for {}",
                record.id
            )));
        }
        record.available_balance = self.cipher.encrypt_amount(balances.available)?;
        record.locked_balance = self.cipher.encrypt_amount(balances.locked)?;
        record.withdrawable_balance = self.cipher.encrypt_amount(balances.withdrawable)?;
        Ok(record)
    }

    fn view(&self, record: &WalletRecord) -> Result<WalletView> {
        Ok(WalletView {
            id: record.id,
            user_id: record.user_id,
            account_number: self.cipher.decrypt(&record.account_number)?,
            balances: self.balances_of(record),
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Single-row read-modify-write. `build` mutates the balances and
    /// returns the record to log; it runs again on every retry.
    fn apply<F>(&self, user_id: UserId, mut build: F) -> Result<(WalletView, Transaction)>
    where
        F: FnMut(&mut Balances) -> Result<Transaction>,
    {
        let attempts = self.config.max_write_retries;
        for attempt in 1..=attempts {
            let record = self.load(user_id)?;
            let mut balances = self.balances_of(&record);
            let tx = build(&mut balances)?;
            let row = self.seal(record, &balances)?;

            match self.store.commit(LedgerCommit::new(vec![row], vec![tx.clone()])) {
                Ok(rows) => {
                    let row = rows
                        .first()
                        .ok_or_else(|| RivalryError::Internal("commit returned no rows".into()))?;
                    tracing::info!(
                        user = %user_id,
                        tx = %tx.id,
                        tx_type = %tx.tx_type,
                        amount = %tx.amount,
                        status = %tx.status,
                        "Ledger entry committed"
                    );
                    return Ok((self.view(row)?, tx));
                }
                Err(RivalryError::VersionConflict { .. }) => {
                    tracing::debug!(user = %user_id, attempt, "Wallet version moved; retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(RivalryError::Contention {
            entity: format!("wallet of {user_id}"),
            attempts,
        })
    }
}

fn generate_account_number() -> String {
    let digits = ACCOUNT_NUMBER_LEN - 1;
    let upper = 10_u64.pow(u32::try_from(digits).unwrap_or(9));
    let n = rand::thread_rng().gen_range(0..upper);
    format!("{ACCOUNT_NUMBER_PREFIX}{n:0digits$}")
}

fn last_chars(s: &str, n: usize) -> &str {
    let start = s.char_indices().rev().nth(n - 1).map_or(0, |(i, _)| i);
    &s[start..]
}
