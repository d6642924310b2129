//! Wallet top-up through an external payment gateway.
//!
//! The gateway is only consulted here. Once it reports an order as paid,
//! [`TopUp::verify`] credits the wallet through the ordinary ledger
//! deposit, tagged with the order and payment references.

use std::sync::{Arc, Mutex};

use rivalry_types::{validate_cash_amount, Caller, Result, RivalryError, UserId, WalletView};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::idempotency::IdempotencyGuard;
use crate::ledger::Ledger;

/// Recently credited orders remembered in memory.
const CREDITED_ORDER_CACHE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub user_id: UserId,
    pub amount: Decimal,
    pub phone: Option<String>,
    pub email: String,
}

/// What the gateway hands back for a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRef {
    pub order_id: String,
    /// Opaque session token the client uses to complete payment.
    pub payment_session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub paid: bool,
    pub amount: Decimal,
    /// The user the order was opened for.
    pub customer_id: UserId,
    pub payment_id: Option<String>,
}

pub trait PaymentGateway: Send + Sync {
    fn create_order(&self, request: &OrderRequest) -> Result<OrderRef>;
    fn verify_order(&self, order_id: &str) -> Result<Verification>;
}

pub struct TopUp {
    ledger: Arc<Ledger>,
    gateway: Arc<dyn PaymentGateway>,
    credited: Mutex<IdempotencyGuard>,
}

impl TopUp {
    pub fn new(ledger: Arc<Ledger>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            ledger,
            gateway,
            credited: Mutex::new(IdempotencyGuard::new(CREDITED_ORDER_CACHE)),
        }
    }

    /// Open a gateway order for `amount`.
    ///
    /// # Errors
    /// `Validation` for amounts below 1; `WalletNotFound` without a wallet.
    pub fn initiate(&self, caller: &Caller, amount: Decimal, phone: Option<&str>) -> Result<OrderRef> {
        validate_cash_amount(amount)?;
        if !self.ledger.has_wallet(caller.user_id)? {
            return Err(RivalryError::WalletNotFound(caller.user_id));
        }
        let order = self.gateway.create_order(&OrderRequest {
            user_id: caller.user_id,
            amount,
            phone: phone.map(String::from),
            email: caller.email.clone(),
        })?;
        tracing::info!(user = %caller.user_id, order = %order.order_id, amount = %amount, "Top-up order created");
        Ok(order)
    }

    /// Credit a paid order. Each order credits at most once, and only to
    /// the user who opened it.
    ///
    /// # Errors
    /// - `ForeignOrder` if `caller` did not open the order
    /// - `PaymentNotCompleted` if the gateway does not report it paid
    /// - `DuplicateOrder` if it was already credited
    pub fn verify(&self, caller: &Caller, order_id: &str) -> Result<WalletView> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(RivalryError::validation("Order ID is required"));
        }
        if self.ledger.deposit_for_order(order_id)?.is_some() {
            return Err(RivalryError::DuplicateOrder(order_id.to_string()));
        }

        let verification = self.gateway.verify_order(order_id)?;
        if verification.customer_id != caller.user_id {
            tracing::warn!(
                user = %caller.user_id,
                customer = %verification.customer_id,
                order = %order_id,
                "Top-up verify for another user's order"
            );
            return Err(RivalryError::ForeignOrder(order_id.to_string()));
        }
        if !verification.paid {
            tracing::warn!(user = %caller.user_id, order = %order_id, "Top-up not paid");
            return Err(RivalryError::PaymentNotCompleted(order_id.to_string()));
        }

        self.guard()?.claim(order_id)?;
        let credited = self.ledger.deposit_with_refs(
            caller.user_id,
            verification.amount,
            Some(order_id.to_string()),
            verification.payment_id,
        );
        if credited.is_err() {
            self.guard()?.release(order_id);
        }
        credited
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, IdempotencyGuard>> {
        self.credited
            .lock()
            .map_err(|_| RivalryError::Storage("credited-order guard lock poisoned".into()))
    }
}
