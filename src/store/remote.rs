//! Store delegate that forwards to the next relay over HTTP.

use async_trait::async_trait;
use axum::http::StatusCode;
use tracing::instrument;

use crate::http::client::UpstreamClient;
use crate::store::{Entry, KvStore, StoreError};

/// `KvStore` backed by an upstream relay answering with JSON entries.
#[derive(Clone)]
pub struct RemoteStore {
    client: UpstreamClient,
}

impl RemoteStore {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KvStore for RemoteStore {
    #[instrument(name = "remote.get", skip(self), fields(service = "client", upstream = %self.client.base_url()))]
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let response = self.client.get(key).await?;

        match response.status {
            status if status.is_success() => {
                let entry: Entry = serde_json::from_slice(&response.body).map_err(|e| {
                    tracing::error!(key, error = %e, "Failed to decode upstream entry");
                    e
                })?;
                tracing::info!(key, value = %entry.value, "Got value");
                Ok(Some(entry.value))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(StoreError::Upstream {
                status: status.as_u16(),
            }),
        }
    }

    #[instrument(name = "remote.set", skip(self), fields(service = "client", upstream = %self.client.base_url()))]
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let response = self.client.post(key, value).await?;

        if response.status.is_success() {
            Ok(())
        } else {
            Err(StoreError::Upstream {
                status: response.status.as_u16(),
            })
        }
    }
}
