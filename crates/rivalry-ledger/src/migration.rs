//! Deploy-time backfill of `account_number_hash` on legacy wallet rows.
//!
//! Rows created before the hash column existed cannot be found by account
//! number. Run [`migrate_account_hashes`] once at startup; gift and owner
//! lookups never trigger it.

use rivalry_types::{Result, RivalryError};
use serde::Serialize;

use crate::codec::{account_hash, FieldCipher};
use crate::repository::{LedgerCommit, LedgerRepository};

/// Outcome of one migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Rows without a hash.
    pub scanned: usize,
    pub updated: usize,
    /// Rows skipped because of a per-row error.
    pub failed: usize,
}

/// Store the SHA-256 of the plaintext account number on every row that
/// lacks one. Per-row failures are logged and counted.
///
/// # Errors
/// Only if the initial scan itself fails.
pub fn migrate_account_hashes(
    store: &dyn LedgerRepository,
    cipher: &FieldCipher,
) -> Result<MigrationReport> {
    let pending: Vec<_> = store
        .wallets()?
        .into_iter()
        .filter(|w| w.account_number_hash.is_none())
        .collect();

    let mut report = MigrationReport {
        scanned: pending.len(),
        ..MigrationReport::default()
    };

    for mut wallet in pending {
        let wallet_id = wallet.id;
        let outcome = cipher.decrypt(&wallet.account_number).and_then(|plain| {
            let plain = plain.trim();
            if plain.is_empty() {
                return Err(RivalryError::Decryption {
                    reason: "empty account number".into(),
                });
            }
            wallet.account_number_hash = Some(account_hash(plain));
            store.commit(LedgerCommit::new(vec![wallet], Vec::new()))
        });

        match outcome {
            Ok(_) => report.updated += 1,
            Err(e) => {
                tracing::error!(wallet = %wallet_id, error = %e, "Failed to migrate wallet account hash");
                report.failed += 1;
            }
        }
    }

    if report.scanned > 0 {
        tracing::info!(
            scanned = report.scanned,
            updated = report.updated,
            failed = report.failed,
            "Account-hash migration finished"
        );
    }
    Ok(report)
}
