//! Field-level encryption for wallet balances and account numbers.
//!
//! Tokens have the shape `nonce:tag:ciphertext`, each segment lowercase hex.
//! The cipher is AES-256-GCM with a 16-byte random nonce per call, so
//! every decrypt verifies integrity.
//!
//! Decryption is deliberately lenient towards rows written before
//! encryption was introduced: a value that does not split into exactly
//! three segments is returned as-is.

use std::fmt;
use std::str::FromStr;

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce, Tag};
use rivalry_types::{EncryptionKey, Result, RivalryError};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

type Aes256Gcm16 = AesGcm<Aes256, U16>;

const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;

/// Symmetric codec for sensitive scalar fields.
#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm16,
}

impl FieldCipher {
    /// # Errors
    /// Returns `Configuration` if the key is rejected by the cipher.
    pub fn new(key: &EncryptionKey) -> Result<Self> {
        let cipher = Aes256Gcm16::new_from_slice(key.as_bytes())
            .map_err(|e| RivalryError::Configuration(format!("invalid encryption key: {e}")))?;
        Ok(Self { cipher })
    }

    /// Encrypt a plaintext into a storable token.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::<U16>::from_slice(&nonce_bytes);
        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(nonce, b"", &mut buffer)
            .map_err(|_| RivalryError::Internal("field encryption failed".into()))?;
        Ok(format!(
            "{}:{}:{}",
            hex::encode(nonce_bytes),
            hex::encode(tag),
            hex::encode(buffer)
        ))
    }

    /// Absent values pass through unencrypted.
    pub fn encrypt_opt(&self, plaintext: Option<&str>) -> Result<Option<String>> {
        plaintext.map(|p| self.encrypt(p)).transpose()
    }

    pub fn encrypt_amount(&self, amount: Decimal) -> Result<String> {
        self.encrypt(&amount.normalize().to_string())
    }

    /// Decrypt a token.
    ///
    /// A value that is not three colon-separated segments is returned
    /// unchanged.
    ///
    /// # Errors
    /// Returns `Decryption` if the segments are not hex of the expected
    /// lengths, authentication fails, or the plaintext is not UTF-8.
    pub fn decrypt(&self, token: &str) -> Result<String> {
        let parts: Vec<&str> = token.split(':').collect();
        let [nonce_hex, tag_hex, body_hex] = parts.as_slice() else {
            return Ok(token.to_string());
        };

        let nonce_bytes = decode_segment("nonce", nonce_hex, Some(NONCE_LEN))?;
        let tag_bytes = decode_segment("tag", tag_hex, Some(TAG_LEN))?;
        let mut buffer = decode_segment("ciphertext", body_hex, None)?;

        self.cipher
            .decrypt_in_place_detached(
                Nonce::<U16>::from_slice(&nonce_bytes),
                b"",
                &mut buffer,
                Tag::<U16>::from_slice(&tag_bytes),
            )
            .map_err(|_| RivalryError::Decryption {
                reason: "authentication failed".into(),
            })?;

        String::from_utf8(buffer).map_err(|_| RivalryError::Decryption {
            reason: "plaintext is not UTF-8".into(),
        })
    }

    /// Decrypt a balance token and parse it as a decimal.
    ///
    /// Anything that does not decode to a number reads as zero.
    #[must_use]
    pub fn decrypt_amount(&self, token: &str) -> Decimal {
        match self.decrypt(token) {
            Ok(plain) => Decimal::from_str(plain.trim()).unwrap_or_else(|_| {
                tracing::warn!("Balance field is not numeric; reading as 0");
                Decimal::ZERO
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Balance field failed to decrypt; reading as 0");
                Decimal::ZERO
            }
        }
    }
}

impl fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldCipher(<redacted>)")
    }
}

fn decode_segment(name: &str, raw: &str, expected_len: Option<usize>) -> Result<Vec<u8>> {
    let bytes = hex::decode(raw).map_err(|_| RivalryError::Decryption {
        reason: format!("{name} is not hex"),
    })?;
    if let Some(len) = expected_len {
        if bytes.len() != len {
            return Err(RivalryError::Decryption {
                reason: format!("{name} must be {len} bytes, got {}", bytes.len()),
            });
        }
    }
    Ok(bytes)
}

/// Deterministic lookup hash of a plaintext account number (SHA-256 hex).
#[must_use]
pub fn account_hash(account_number: &str) -> String {
    hex::encode(Sha256::digest(account_number.as_bytes()))
}
