//! Wallet PIN reset through a one-time password sent by email.
//!
//! ```text
//! request_pin_reset ──► OTP stored (expires after otp_ttl_secs) ──► email
//!        verify_pin_otp ──► ok | InvalidOtp | OtpExpired
//!             reset_pin ──► verify + rehash PIN + forget OTP
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rivalry_types::constants::OTP_LENGTH;
use rivalry_types::{Caller, Email, Mailer, Result, RivalryError, UserId};

use crate::ledger::Ledger;

#[derive(Debug, Clone)]
struct PendingOtp {
    code: String,
    expires_at: DateTime<Utc>,
}

pub struct PinReset {
    ledger: Arc<Ledger>,
    mailer: Arc<dyn Mailer>,
    pending: Mutex<HashMap<UserId, PendingOtp>>,
}

impl PinReset {
    pub fn new(ledger: Arc<Ledger>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            ledger,
            mailer,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn request_pin_reset(&self, caller: &Caller) -> Result<()> {
        self.request_pin_reset_at(caller, Utc::now())
    }

    /// Issue a fresh OTP, replacing any outstanding one, and email it.
    /// A failed email is logged; the OTP stays valid.
    pub fn request_pin_reset_at(&self, caller: &Caller, now: DateTime<Utc>) -> Result<()> {
        if !self.ledger.has_wallet(caller.user_id)? {
            return Err(RivalryError::WalletNotFound(caller.user_id));
        }

        let code = generate_otp();
        let expires_at = now + Duration::seconds(self.ledger.config().otp_ttl_secs);
        self.lock()?.insert(
            caller.user_id,
            PendingOtp {
                code: code.clone(),
                expires_at,
            },
        );

        let minutes = self.ledger.config().otp_ttl_secs / 60;
        let email = Email {
            to: caller.email.clone(),
            subject: "Wallet PIN Reset OTP".to_string(),
            text: format!(
                "Your OTP for resetting your wallet PIN is {code}. It expires in {minutes} minutes."
            ),
            html: format!(
                "<p>Your OTP for resetting your wallet PIN is <b>{code}</b>. It expires in {minutes} minutes.</p>"
            ),
        };
        if let Err(e) = self.mailer.send(&email) {
            tracing::warn!(user = %caller.user_id, error = %e, "PIN reset email not delivered");
        }
        tracing::info!(user = %caller.user_id, "PIN reset OTP issued");
        Ok(())
    }

    pub fn verify_pin_otp(&self, user_id: UserId, otp: &str) -> Result<()> {
        self.verify_pin_otp_at(user_id, otp, Utc::now())
    }

    /// # Errors
    /// `InvalidOtp` if none is outstanding or it does not match;
    /// `OtpExpired` once past its expiry.
    pub fn verify_pin_otp_at(&self, user_id: UserId, otp: &str, now: DateTime<Utc>) -> Result<()> {
        let pending = self.lock()?;
        let entry = pending
            .get(&user_id)
            .filter(|p| p.code == otp.trim())
            .ok_or(RivalryError::InvalidOtp)?;
        if entry.expires_at < now {
            return Err(RivalryError::OtpExpired);
        }
        Ok(())
    }

    pub fn reset_pin(&self, user_id: UserId, otp: &str, new_pin: &str) -> Result<()> {
        self.reset_pin_at(user_id, otp, new_pin, Utc::now())
    }

    /// Verify the OTP, store the new PIN, and forget the OTP.
    pub fn reset_pin_at(
        &self,
        user_id: UserId,
        otp: &str,
        new_pin: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.verify_pin_otp_at(user_id, otp, now)?;
        self.ledger.set_pin(user_id, new_pin)?;
        self.lock()?.remove(&user_id);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<UserId, PendingOtp>>> {
        self.pending
            .lock()
            .map_err(|_| RivalryError::Storage("OTP table lock poisoned".into()))
    }

    /// The outstanding code for a user. Lets tests skip the mailbox.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn outstanding_otp(&self, user_id: UserId) -> Option<String> {
        self.pending.lock().ok()?.get(&user_id).map(|p| p.code.clone())
    }
}

fn generate_otp() -> String {
    let low = 10_u32.pow(u32::try_from(OTP_LENGTH - 1).unwrap_or(5));
    rand::thread_rng().gen_range(low..low * 10).to_string()
}
