//! sled-backed paste store
//!
//! All pastes live in a single sled tree. Writes go through a transaction and
//! are flushed before `put` returns.

use super::{check_size, Digest, PasteStore, StoreError, StoreResult, PASTES_TREE};
use sled::transaction::TransactionError;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Default time to wait for another process to release the database lock
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(1);

/// Delay between lock acquisition attempts
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Persistent paste store
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    pastes: sled::Tree,
}

impl SledStore {
    /// Open (or create) the database at `path`.
    ///
    /// sled takes an exclusive lock on the database. While another process
    /// holds it, the open is retried until `timeout` runs out.
    pub fn open<P: AsRef<Path>>(path: P, timeout: Duration) -> StoreResult<Self> {
        let path = path.as_ref();
        let db = open_with_timeout(path, timeout)?;

        let pastes = db.open_tree(PASTES_TREE)?;
        log::debug!("Opened {} tree in {:?}", PASTES_TREE, path);

        Ok(Self { db, pastes })
    }

    /// Number of stored pastes
    pub fn len(&self) -> usize {
        self.pastes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pastes.is_empty()
    }
}

fn open_with_timeout(path: &Path, timeout: Duration) -> StoreResult<sled::Db> {
    let deadline = Instant::now() + timeout;
    loop {
        match sled::Config::new().path(path).open() {
            Ok(db) => return Ok(db),
            Err(sled::Error::Io(e)) if is_lock_error(&e) => {
                if Instant::now() >= deadline {
                    return Err(StoreError::Locked {
                        path: PathBuf::from(path),
                        timeout,
                    });
                }
                log::debug!("Database {:?} is locked, retrying", path);
                thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// sled reports a held lock as a plain I/O error ("could not acquire lock on ...")
fn is_lock_error(e: &std::io::Error) -> bool {
    e.to_string().starts_with(LOCK_ERROR_PREFIX)
}

const LOCK_ERROR_PREFIX: &str = "could not acquire lock";

impl PasteStore for SledStore {
    fn put(&self, payload: &[u8]) -> StoreResult<String> {
        check_size(payload)?;
        let digest = Digest::of(payload);

        let result: sled::transaction::TransactionResult<()> = self.pastes.transaction(|tx| {
            tx.insert(&digest.as_bytes()[..], payload)?;
            Ok(())
        });
        match result {
            Ok(()) => {}
            Err(TransactionError::Storage(e)) => return Err(e.into()),
            Err(TransactionError::Abort(())) => {
                return Err(StoreError::StorageUnavailable(
                    "paste transaction aborted".to_string(),
                ))
            }
        }
        self.pastes.flush()?;

        Ok(digest.to_hex())
    }

    fn get(&self, id: &str) -> StoreResult<Vec<u8>> {
        let digest = Digest::from_hex(id).ok_or(StoreError::NotFound)?;
        match self.pastes.get(digest.as_bytes())? {
            Some(value) => Ok(value.to_vec()),
            None => Err(StoreError::NotFound),
        }
    }

    fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MAX_PASTE_SIZE;
    use tempfile::TempDir;

    fn open_temp() -> (SledStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SledStore::open(temp_dir.path().join("pastes.db"), DEFAULT_OPEN_TIMEOUT)
            .unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_put_and_get() {
        let (store, _temp_dir) = open_temp();

        let id = store.put(b"hello world\n").unwrap();
        assert_eq!(
            id,
            "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447"
        );
        assert_eq!(store.get(&id).unwrap(), b"hello world\n");
    }

    #[test]
    fn test_put_is_idempotent() {
        let (store, _temp_dir) = open_temp();

        let first = store.put(b"duplicate test").unwrap();
        let second = store.put(b"duplicate test").unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_empty_paste_is_not_missing() {
        let (store, _temp_dir) = open_temp();

        let id = store.put(b"").unwrap();
        assert_eq!(store.get(&id).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_oversize_paste_is_rejected() {
        let (store, _temp_dir) = open_temp();

        let payload = vec![b'x'; MAX_PASTE_SIZE + 1];
        assert!(matches!(store.put(&payload), Err(StoreError::PasteTooLarge)));
        assert!(store.is_empty());
        assert!(matches!(
            store.get(&Digest::of(&payload).to_hex()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_max_size_paste_is_accepted() {
        let (store, _temp_dir) = open_temp();

        let payload = vec![b'y'; MAX_PASTE_SIZE];
        let id = store.put(&payload).unwrap();
        assert_eq!(store.get(&id).unwrap().len(), MAX_PASTE_SIZE);
    }

    #[test]
    fn test_unknown_and_malformed_ids() {
        let (store, _temp_dir) = open_temp();
        store.put(b"something").unwrap();

        let unknown = Digest::of(b"never stored").to_hex();
        assert!(matches!(store.get(&unknown), Err(StoreError::NotFound)));
        assert!(matches!(store.get("deadbeef"), Err(StoreError::NotFound)));
        assert!(matches!(store.get("not-hex-at-all"), Err(StoreError::NotFound)));
        assert!(matches!(store.get(""), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_pastes_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pastes.db");

        let id = {
            let store = SledStore::open(&path, DEFAULT_OPEN_TIMEOUT).unwrap();
            let id = store.put(b"persistent").unwrap();
            store.flush().unwrap();
            id
        };

        // sled's flusher thread can hold the lock briefly after drop
        let store = SledStore::open(&path, Duration::from_secs(5)).unwrap();
        assert_eq!(store.get(&id).unwrap(), b"persistent");
    }

    #[test]
    fn test_lock_error_matches_only_held_lock() {
        let held = std::io::Error::new(
            std::io::ErrorKind::Other,
            "could not acquire lock on \"/tmp/pastes.db/db\": Os { code: 11 }",
        );
        assert!(is_lock_error(&held));

        let unrelated = std::io::Error::new(
            std::io::ErrorKind::Other,
            "failed to read block header",
        );
        assert!(!is_lock_error(&unrelated));
        let would_block = std::io::Error::from(std::io::ErrorKind::WouldBlock);
        assert!(!is_lock_error(&would_block));
    }

    #[test]
    fn test_second_open_times_out() {
        let (store, temp_dir) = open_temp();
        store.put(b"held").unwrap();

        let started = Instant::now();
        let result = SledStore::open(
            temp_dir.path().join("pastes.db"),
            Duration::from_millis(200),
        );
        assert!(matches!(result, Err(StoreError::Locked { .. })));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
