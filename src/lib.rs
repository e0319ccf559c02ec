//! Content-addressed command line pastebin
//!
//! Pastes are stored in a sled database keyed by the SHA-256 digest of their
//! contents and served over HTTP at `/<hex digest>`.

pub mod config;
pub mod server;
pub mod store;

pub use config::Config;
pub use store::{Digest, PasteStore, SledStore, StoreError, MAX_PASTE_SIZE};
