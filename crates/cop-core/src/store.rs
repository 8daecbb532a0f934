//! Application-server storage interface.
//!
//! The real deployment stores envelopes behind an HTTP application server;
//! the core only ever sees this trait: store an opaque envelope by tx id,
//! fetch it back, append disclosure addenda, and list share records for
//! audit. The in-memory implementation serves tests and local flows.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use cop_crypto::envelope::{Addendum, Envelope, ShareRecord};

/// Errors from store operations.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("transaction not found: {0}")]
    NotFound(String),

    #[error("transaction already exists: {0}")]
    AlreadyExists(String),

    #[error("storage io failure: {0}")]
    Io(String),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("serialization error")]
    Serialization,
}

/// Storage abstraction over protected transactions.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Store a fresh envelope under its tx id. Write-once.
    async fn put_envelope(&self, envelope: Envelope) -> Result<(), StoreError>;

    /// Fetch the envelope for `tx_id`, including all appended addenda.
    async fn get_envelope(&self, tx_id: &str) -> Result<Envelope, StoreError>;

    /// Append a disclosure addendum to an existing envelope. This is the
    /// only way an envelope grows after protect time.
    async fn append_addendum(&self, tx_id: &str, addendum: Addendum) -> Result<(), StoreError>;

    /// All share records attached to `tx_id`, deduplicated. Group
    /// disclosures repeat one record across member wraps.
    async fn list_share_records(&self, tx_id: &str) -> Result<Vec<ShareRecord>, StoreError>;

    /// Every stored tx id, for audit sweeps.
    async fn list_tx_ids(&self) -> Result<Vec<String>, StoreError>;
}

/// Collect the distinct share records out of an envelope's addenda.
pub(crate) fn distinct_share_records(envelope: &Envelope) -> Vec<ShareRecord> {
    let mut records: Vec<ShareRecord> = Vec::new();
    for addendum in &envelope.addenda {
        if !records.iter().any(|r| *r == addendum.share_record) {
            records.push(addendum.share_record.clone());
        }
    }
    records
}

/// Thread-safe in-memory store.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    envelopes: Arc<RwLock<HashMap<String, Envelope>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn put_envelope(&self, envelope: Envelope) -> Result<(), StoreError> {
        let mut envelopes = self.envelopes.write().await;
        if envelopes.contains_key(&envelope.tx_id) {
            return Err(StoreError::AlreadyExists(envelope.tx_id.clone()));
        }
        envelopes.insert(envelope.tx_id.clone(), envelope);
        Ok(())
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
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use cop_crypto::canonical::b64;
    use cop_crypto::envelope::{ShareKind, WrappedKey, VERSION};

    fn make_envelope(tx_byte: u8) -> Envelope {
        Envelope {
            addenda: Vec::new(),
            buyer: "Buyer Co".into(),
            buyer_sig: None,
            content_ct: b64(&[9u8; 40]),
            content_hash: b64(&[1u8; 32]),
            content_nonce: b64(&[2u8; 12]),
            direct_recipients: vec![WrappedKey {
                ct: b64(&[3u8; 48]),
                eph_pub: b64(&[4u8; 32]),
                name: "Seller Co".into(),
                nonce: b64(&[5u8; 12]),
            }],
            group_recipients: Vec::new(),
            seller: "Seller Co".into(),
            seller_sig: b64(&[6u8; 64]),
            tx_id: b64(&[tx_byte; 16]),
            version: VERSION.into(),
        }
    }

    fn make_addendum(tx_id: &str, to: &str) -> Addendum {
        Addendum {
            share_record: ShareRecord {
                disclosed_to: to.into(),
                kind: ShareKind::Direct,
                sharer: "Buyer Co".into(),
                sig: Some(b64(&[8u8; 64])),
                timestamp: "2026-03-14T09:26:53Z".into(),
                tx_id: tx_id.into(),
            },
            wrap: None,
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryStore::new();
        let envelope = make_envelope(1);
        let tx_id = envelope.tx_id.clone();

        store.put_envelope(envelope.clone()).await.unwrap();
        let loaded = store.get_envelope(&tx_id).await.unwrap();
        assert_eq!(loaded, envelope);
    }

    #[tokio::test]
    async fn test_put_is_write_once() {
        let store = InMemoryStore::new();
        store.put_envelope(make_envelope(1)).await.unwrap();
        assert!(matches!(
            store.put_envelope(make_envelope(1)).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.get_envelope("missing").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_append_addendum_and_list_records() {
        let store = InMemoryStore::new();
        let envelope = make_envelope(1);
        let tx_id = envelope.tx_id.clone();
        store.put_envelope(envelope).await.unwrap();

        let addendum = make_addendum(&tx_id, "Auditor Corp");
        store.append_addendum(&tx_id, addendum.clone()).await.unwrap();
        // Same record twice, as a group disclosure would produce.
        store.append_addendum(&tx_id, addendum).await.unwrap();
        store
            .append_addendum(&tx_id, make_addendum(&tx_id, "Other Co"))
            .await
            .unwrap();

        let loaded = store.get_envelope(&tx_id).await.unwrap();
        assert_eq!(loaded.addenda.len(), 3);

        let records = store.list_share_records(&tx_id).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_list_tx_ids() {
        let store = InMemoryStore::new();
        store.put_envelope(make_envelope(1)).await.unwrap();
        store.put_envelope(make_envelope(2)).await.unwrap();
        assert_eq!(store.list_tx_ids().await.unwrap().len(), 2);
    }
}
