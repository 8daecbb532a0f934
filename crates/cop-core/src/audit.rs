//! Seller-side audit over the store.

use thiserror::Error;
use tracing::info;

use cop_crypto::audit::{audit_envelope, audit_records, AuditFailure, DisclosureEdge};
use cop_crypto::directory::PublicKeyDirectory;

use crate::store::{StoreError, TransactionStore};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// The reconstructed disclosure trail for one transaction.
#[derive(Clone, Debug)]
pub struct AuditReport {
    pub tx_id: String,
    /// Verified disclosures, in addendum order
    pub edges: Vec<DisclosureEdge>,
    pub failures: Vec<AuditFailure>,
    /// Distinct share records retrieved from the store
    pub record_count: usize,
}

impl AuditReport {
    pub fn clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetch everything recorded for `tx_id` and verify each disclosure: the
/// addenda pairing on the envelope, and every retrieved record
/// independently.
pub async fn audit_transaction(
    store: &dyn TransactionStore,
    directory: &dyn PublicKeyDirectory,
    tx_id: &str,
) -> Result<AuditReport, AuditError> {
    let envelope = store.get_envelope(tx_id).await?;
    let records = store.list_share_records(tx_id).await?;

    let envelope_outcome = audit_envelope(&envelope, directory);
    let records_outcome = audit_records(&records, directory);

    let mut failures = envelope_outcome.failures;
    failures.extend(records_outcome.failures);

    let report = AuditReport {
        tx_id: tx_id.to_string(),
        edges: envelope_outcome.edges,
        failures,
        record_count: records.len(),
    };
    info!(
        tx_id,
        edges = report.edges.len(),
        failures = report.failures.len(),
        "audited transaction"
    );
    Ok(report)
}
