//! Disclosure service: direct and group shares through the store.
//!
//! The sharer recovers the content key from their own wrap, builds the
//! signed share record plus rewrap addenda, and appends them to the stored
//! envelope. Timestamps are clamped non-decreasing per sharer.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Timelike, Utc};
use thiserror::Error;
use tracing::info;

use cop_crypto::directory::PublicKeyDirectory;
use cop_crypto::envelope::ShareRecord;
use cop_crypto::groups::GroupResolver;
use cop_crypto::identity::IdentityKeyPair;
use cop_crypto::share::{build_direct_addendum, build_group_addenda};
use cop_crypto::unprotect::recover_content_key;
use cop_crypto::CoreError;

use crate::store::{StoreError, TransactionStore};

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CoreError),

    /// Sharing requires a named buyer on the envelope.
    #[error("envelope names no buyer")]
    BuyerNotSet,
}

/// Stateful disclosure front over a transaction store.
pub struct DisclosureService<'a> {
    store: &'a dyn TransactionStore,
    last_issued: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl<'a> DisclosureService<'a> {
    pub fn new(store: &'a dyn TransactionStore) -> Self {
        Self {
            store,
            last_issued: Mutex::new(HashMap::new()),
        }
    }

    /// Disclose `tx_id` to one named party.
    pub async fn share_direct(
        &self,
        tx_id: &str,
        sharer: &str,
        sharer_keys: &IdentityKeyPair,
        to: &str,
        directory: &dyn PublicKeyDirectory,
    ) -> Result<ShareRecord, ShareError> {
        let envelope = self.store.get_envelope(tx_id).await?;
        if envelope.buyer.is_empty() {
            return Err(ShareError::BuyerNotSet);
        }

        let content_key = recover_content_key(&envelope, sharer, sharer_keys, directory)?;
        let timestamp = self.next_timestamp(sharer);
        let addendum = build_direct_addendum(
            &envelope,
            sharer,
            sharer_keys,
            to,
            &content_key,
            directory,
            timestamp,
        )?;
        let record = addendum.share_record.clone();
        self.store.append_addendum(tx_id, addendum).await?;

        info!(sharer, to, tx_id, "recorded direct disclosure");
        Ok(record)
    }

    /// Disclose `tx_id` to every current member of a group.
    pub async fn share_group(
        &self,
        tx_id: &str,
        sharer: &str,
        sharer_keys: &IdentityKeyPair,
        group_id: &str,
        directory: &dyn PublicKeyDirectory,
        resolver: &dyn GroupResolver,
    ) -> Result<ShareRecord, ShareError> {
        let envelope = self.store.get_envelope(tx_id).await?;
        if envelope.buyer.is_empty() {
            return Err(ShareError::BuyerNotSet);
        }

        let content_key = recover_content_key(&envelope, sharer, sharer_keys, directory)?;
        let timestamp = self.next_timestamp(sharer);
        let addenda = build_group_addenda(
            &envelope,
            sharer,
            sharer_keys,
            group_id,
            &content_key,
            directory,
            resolver,
            timestamp,
        )?;
        let record = addenda
            .first()
            .map(|a| a.share_record.clone())
            .ok_or(CoreError::UnknownGroup(group_id.to_string()))?;
        for addendum in addenda {
            self.store.append_addendum(tx_id, addendum).await?;
        }

        info!(sharer, group_id, tx_id, "recorded group disclosure");
        Ok(record)
    }

    /// Second-resolution wall clock, never moving backwards per sharer.
    fn next_timestamp(&self, sharer: &str) -> DateTime<Utc> {
        let now = Utc::now();
        let now = now.with_nanosecond(0).unwrap_or(now);
        let mut last_issued = self.last_issued.lock().expect("timestamp lock poisoned");
        let ts = match last_issued.get(sharer) {
            Some(last) if now < *last => *last,
            _ => now,
        };
        last_issued.insert(sharer.to_string(), ts);
        ts
    }
}
