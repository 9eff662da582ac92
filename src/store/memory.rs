//! In-memory store held by the backend.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::instrument;

use crate::store::{KvStore, StoreError};

/// Concurrent map of entries; lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    #[instrument(name = "store.get", skip(self), fields(service = "store"))]
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self.entries.get(key).map(|entry| entry.value().clone());
        match &value {
            Some(value) => tracing::info!(key, value = %value, "Found key"),
            None => tracing::info!(key, "Key not found"),
        }
        Ok(value)
    }

    #[instrument(name = "store.set", skip(self), fields(service = "store"))]
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        tracing::info!(key, value, "Set key");
        Ok(())
    }
}
