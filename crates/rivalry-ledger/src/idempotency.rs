//! Bounded record of payment orders already credited.
//!
//! Each gateway order may fund the wallet once. The guard keeps the most
//! recent `max_size` order references; older ones fall back to the
//! ledger's own `order_id` lookup.

use std::collections::{HashSet, VecDeque};

use rivalry_types::{Result, RivalryError};

pub struct IdempotencyGuard {
    credited: HashSet<String>,
    /// Insertion order, front = oldest.
    order: VecDeque<String>,
    max_size: usize,
}

impl IdempotencyGuard {
    /// # Panics
    /// Panics if `max_size` is zero.
    pub fn new(max_size: usize) -> Self {
        assert!(max_size > 0, "IdempotencyGuard max_size must be > 0");
        Self {
            credited: HashSet::with_capacity(max_size),
            order: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Claim an order reference.
    ///
    /// # Errors
    /// `DuplicateOrder` if it was already claimed.
    pub fn claim(&mut self, order_id: &str) -> Result<()> {
        if self.credited.contains(order_id) {
            return Err(RivalryError::DuplicateOrder(order_id.to_string()));
        }

        if self.credited.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.credited.remove(&oldest);
            }
        }

        self.credited.insert(order_id.to_string());
        self.order.push_back(order_id.to_string());
        Ok(())
    }

    /// Give a claim back after the credit it guarded failed.
    pub fn release(&mut self, order_id: &str) {
        if self.credited.remove(order_id) {
            self.order.retain(|o| o != order_id);
        }
    }

    pub fn is_claimed(&self, order_id: &str) -> bool {
        self.credited.contains(order_id)
    }

    pub fn len(&self) -> usize {
        self.credited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credited.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_duplicate() {
        let mut guard = IdempotencyGuard::new(8);
        guard.claim("order_1").unwrap();
        let err = guard.claim("order_1").unwrap_err();
        assert!(matches!(err, RivalryError::DuplicateOrder(ref o) if o == "order_1"));
    }

    #[test]
    fn evicts_oldest() {
        let mut guard = IdempotencyGuard::new(2);
        guard.claim("a").unwrap();
        guard.claim("b").unwrap();
        guard.claim("c").unwrap();
        assert_eq!(guard.len(), 2);
        assert!(!guard.is_claimed("a"));
        assert!(guard.is_claimed("b"));
        assert!(guard.is_claimed("c"));
    }

    #[test]
    fn release_allows_retry() {
        let mut guard = IdempotencyGuard::new(4);
        guard.claim("a").unwrap();
        guard.release("a");
        assert!(guard.is_empty());
        guard.claim("a").unwrap();
    }

    #[test]
    #[should_panic(expected = "max_size must be > 0")]
    fn zero_max_size_panics() {
        let _ = IdempotencyGuard::new(0);
    }
}
