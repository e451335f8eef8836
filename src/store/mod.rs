//! Cart persistence: the device-local slot and the per-account remote row.
pub mod local;
pub mod remote;

use thiserror::Error;

pub use local::{FileSlot, KeyValueSlot, LocalCartStore, LocalLoad, MemorySlot};
pub use remote::{load_items, MemoryCartStore, PgCartStore, RemoteCartStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("local storage I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}
