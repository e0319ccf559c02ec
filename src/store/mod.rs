//! Content-addressed paste storage
//!
//! Pastes are keyed by the SHA-256 digest of their bytes. The `PasteStore`
//! trait is what the HTTP layer talks to; `SledStore` is the persistent
//! implementation.

pub mod sled_store;

use sha2::{Digest as _, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub use sled_store::SledStore;

/// Largest accepted paste, in bytes (4 MiB)
pub const MAX_PASTE_SIZE: usize = 4 * 1024 * 1024;

/// Name of the sled tree holding all pastes
pub const PASTES_TREE: &str = "pastes";

/// Paste storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("paste too large (maximum size {} bytes)", MAX_PASTE_SIZE)]
    PasteTooLarge,

    /// Unknown or malformed paste id. The two are deliberately not told apart.
    #[error("not found")]
    NotFound,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("database {path:?} is locked by another process (waited {timeout:?})")]
    Locked { path: PathBuf, timeout: Duration },

    #[error("{0}")]
    Other(String),
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::StorageUnavailable(e.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// SHA-256 digest identifying a paste
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Digest of a payload
    pub fn of(payload: &[u8]) -> Self {
        Digest(Sha256::digest(payload).into())
    }

    /// Parse a 64-character hex id. Anything else yields `None`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let mut raw = [0u8; 32];
        hex::decode_to_slice(s, &mut raw).ok()?;
        Some(Digest(raw))
    }

    /// Lowercase hex rendering used in URLs
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Fail with `PasteTooLarge` when a payload exceeds `MAX_PASTE_SIZE`
pub fn check_size(payload: &[u8]) -> StoreResult<()> {
    if payload.len() > MAX_PASTE_SIZE {
        return Err(StoreError::PasteTooLarge);
    }
    Ok(())
}

/// Paste store trait - immutable, content-addressed byte storage.
///
/// Distinct payloads with the same digest would overwrite each other. SHA-256
/// collisions are treated as impossible and not checked for.
pub trait PasteStore: Send + Sync {
    /// Store a paste and return its lowercase hex digest.
    /// Must be durable before returning.
    fn put(&self, payload: &[u8]) -> StoreResult<String>;

    /// Fetch a paste by hex digest.
    /// Malformed ids and unknown ids both fail with `NotFound`.
    fn get(&self, id: &str) -> StoreResult<Vec<u8>>;

    /// Flush pending writes to stable storage.
    fn flush(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_of_known_text() {
        let digest = Digest::of(b"hello world\n");
        assert_eq!(
            digest.to_hex(),
            "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447"
        );
    }

    #[test]
    fn test_digest_of_empty() {
        assert_eq!(
            Digest::of(b"").to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_from_hex_accepts_either_case() {
        let digest = Digest::of(b"abc");
        let upper = digest.to_hex().to_uppercase();
        assert_eq!(Digest::from_hex(&upper), Some(digest));
    }

    #[test]
    fn test_from_hex_rejects_malformed() {
        assert_eq!(Digest::from_hex("deadbeef"), None);
        assert_eq!(Digest::from_hex(""), None);
        assert_eq!(Digest::from_hex(&"zz".repeat(32)), None);
        assert_eq!(Digest::from_hex(&"ab".repeat(33)), None);
    }

    #[test]
    fn test_check_size_limit() {
        assert!(check_size(&vec![0u8; MAX_PASTE_SIZE]).is_ok());
        assert!(matches!(
            check_size(&vec![0u8; MAX_PASTE_SIZE + 1]),
            Err(StoreError::PasteTooLarge)
        ));
    }

    #[test]
    fn test_too_large_message_names_limit() {
        assert_eq!(
            StoreError::PasteTooLarge.to_string(),
            "paste too large (maximum size 4194304 bytes)"
        );
    }
}
