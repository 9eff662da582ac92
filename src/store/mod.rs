//! Key-value store subsystem.
//!
//! # Data Flow
//! ```text
//! relay controller
//!     → KvStore trait
//!         → memory.rs (backend: concurrent in-memory map)
//!         → remote.rs (frontend: next hop over HTTP)
//! ```
//!
//! # Design Decisions
//! - `get` returns `Ok(None)` for a missing key; absence is not an error and
//!   is distinct from an empty value
//! - `set` overwrites; last write wins

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
pub mod remote;

pub use memory::MemoryStore;
pub use remote::RemoteStore;

/// Result payload exchanged between relays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

/// Failures a store delegate can report.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("upstream returned {status}")]
    Upstream { status: u16 },

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Look up `key`. `Ok(None)` when the key was never set.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
