//! JSON-file-backed transaction store.
//!
//! One JSON document maps tx id to envelope. Writes go through a temp file
//! and an atomic rename so a crash never leaves a torn document. Suits the
//! CLI and demo flows; production deployments sit behind the application
//! server instead.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use cop_crypto::envelope::{Addendum, Envelope, ShareRecord};

use crate::store::{distinct_share_records, StoreError, TransactionStore};

pub struct FileStore {
    path: PathBuf,
    envelopes: RwLock<HashMap<String, Envelope>>,
}

impl FileStore {
    /// Open a store at `path`, loading any existing document.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let envelopes = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        Ok(Self {
            path,
            envelopes: RwLock::new(envelopes),
        })
    }

    async fn flush(&self, envelopes: &HashMap<String, Envelope>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(envelopes).map_err(|_| StoreError::Serialization)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        debug!(path = %self.path.display(), count = envelopes.len(), "flushed store");
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for FileStore {
    async fn put_envelope(&self, envelope: Envelope) -> Result<(), StoreError> {
        let mut envelopes = self.envelopes.write().await;
        if envelopes.contains_key(&envelope.tx_id) {
            return Err(StoreError::AlreadyExists(envelope.tx_id.clone()));
        }
        envelopes.insert(envelope.tx_id.clone(), envelope);
        self.flush(&envelopes).await
    }

    async fn get_envelope(&self, tx_id: &str) -> Result<Envelope, StoreError> {
        let envelopes = self.envelopes.read().await;
        envelopes
            .get(tx_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(tx_id.to_string()))
    }

    async fn append_addendum(&self, tx_id: &str, addendum: Addendum) -> Result<(), StoreError> {
        let mut envelopes = self.envelopes.write().await;
        let envelope = envelopes
            .get_mut(tx_id)
            .ok_or_else(|| StoreError::NotFound(tx_id.to_string()))?;
        envelope.addenda.push(addendum);
        self.flush(&envelopes).await
    }

    async fn list_share_records(&self, tx_id: &str) -> Result<Vec<ShareRecord>, StoreError> {
        let envelopes = self.envelopes.read().await;
        let envelope = envelopes
            .get(tx_id)
            .ok_or_else(|| StoreError::NotFound(tx_id.to_string()))?;
        Ok(distinct_share_records(envelope))
    }

    async fn list_tx_ids(&self) -> Result<Vec<String>, StoreError> {
        let envelopes = self.envelopes.read().await;
        Ok(envelopes.keys().cloned().collect())
    }
}
