//! # Storage Module
//!
//! Persistent key-value storage backing the token store. Backends are
//! synchronous and share the `KeyValueStorage` trait so the session layer
//! never cares where tokens actually live.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::{MemoryStorage, UnavailableStorage};

/// Storage failures. These never escape the token store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("persistent storage is not available in this context")]
    Unavailable,
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// String slots keyed by name.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
