//! Value envelope carrying the metadata byte and expiry.
//!
//! LMDB stores plain bytes, so every value is wrapped in a fixed header:
//!
//! ```text
//! [meta: 1 byte][expires_at: 8 bytes, i64 LE millis, 0 = never][value]
//! ```

use chrono::{DateTime, Utc};
use stash_core::StoreError;

/// Size of the header in front of every stored value.
pub const HEADER_LEN: usize = 9;

const NEVER: i64 = 0;

/// A decoded view over stored bytes. Borrows from the engine's memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub meta: u8,
    expires_at_millis: i64,
    pub value: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Wrap `value` for storage.
    pub fn encode(value: &[u8], meta: u8, expires_at: Option<DateTime<Utc>>) -> Vec<u8> {
        // Clamp so an expiry before the epoch never collides with NEVER.
        let expires_at_millis = expires_at
            .map(|at| at.timestamp_millis().max(1))
            .unwrap_or(NEVER);

        let mut bytes = Vec::with_capacity(HEADER_LEN + value.len());
        bytes.push(meta);
        bytes.extend_from_slice(&expires_at_millis.to_le_bytes());
        bytes.extend_from_slice(value);
        bytes
    }

    /// Split stored bytes into header fields and value.
    pub fn decode(bytes: &'a [u8]) -> Result<Self, StoreError> {
        if bytes.len() < HEADER_LEN {
            return Err(StoreError::Corrupt {
                reason: format!(
                    "entry is {} bytes, shorter than the {}-byte header",
                    bytes.len(),
                    HEADER_LEN
                ),
            });
        }

        let expiry_bytes: [u8; 8] = bytes[1..HEADER_LEN]
            .try_into()
            .map_err(|_| StoreError::Corrupt {
                reason: "invalid expiry field".to_string(),
            })?;

        Ok(Self {
            meta: bytes[0],
            expires_at_millis: i64::from_le_bytes(expiry_bytes),
            value: &bytes[HEADER_LEN..],
        })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if self.expires_at_millis == NEVER {
            return None;
        }
        DateTime::from_timestamp_millis(self.expires_at_millis)
    }

    /// Whether the entry has expired as of `now_millis`.
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        self.expires_at_millis != NEVER && now_millis >= self.expires_at_millis
    }
}
