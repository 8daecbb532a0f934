//! Seller-side audit: verify disclosure receipts and rebuild the graph.

use crate::check::verify_record_sig;
use crate::directory::PublicKeyDirectory;
use crate::envelope::{Envelope, ShareKind, ShareRecord};

/// One verified disclosure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisclosureEdge {
    pub sharer: String,
    pub disclosed_to: String,
    pub kind: ShareKind,
    pub timestamp: String,
}

/// An audit finding that blocks trusting part of the trail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuditFailure {
    /// Record at this index failed signature verification.
    RecordSignature { index: usize, sharer: String },
    /// Addendum wrap at this index has no verifying share record.
    OrphanWrap { index: usize },
}

/// Outcome of auditing a set of share records.
#[derive(Clone, Debug, Default)]
pub struct AuditOutcome {
    pub edges: Vec<DisclosureEdge>,
    pub failures: Vec<AuditFailure>,
}

impl AuditOutcome {
    pub fn clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Verify every share record independently and collect the disclosure graph.
pub fn audit_records(
    records: &[ShareRecord],
    directory: &dyn PublicKeyDirectory,
) -> AuditOutcome {
    let mut outcome = AuditOutcome::default();
    for (index, record) in records.iter().enumerate() {
        if verify_record_sig(directory, record) {
            outcome.edges.push(DisclosureEdge {
                sharer: record.sharer.clone(),
                disclosed_to: record.disclosed_to.clone(),
                kind: record.kind,
                timestamp: record.timestamp.clone(),
            });
        } else {
            outcome.failures.push(AuditFailure::RecordSignature {
                index,
                sharer: record.sharer.clone(),
            });
        }
    }
    outcome
}

/// Audit an envelope's addenda: every wrap must ride with a verifying
/// record, and every record contributes an edge.
pub fn audit_envelope(envelope: &Envelope, directory: &dyn PublicKeyDirectory) -> AuditOutcome {
    let mut outcome = AuditOutcome::default();
    let mut seen_records: Vec<&ShareRecord> = Vec::new();

    for (index, addendum) in envelope.addenda.iter().enumerate() {
        let record = &addendum.share_record;
        let valid = verify_record_sig(directory, record);
        if !valid {
            outcome.failures.push(AuditFailure::RecordSignature {
                index,
                sharer: record.sharer.clone(),
            });
            if addendum.wrap.is_some() {
                outcome.failures.push(AuditFailure::OrphanWrap { index });
            }
            continue;
        }
        // Group disclosures repeat one record across member wraps; count
        // the edge once.
        if !seen_records.iter().any(|r| **r == *record) {
            seen_records.push(record);
            outcome.edges.push(DisclosureEdge {
                sharer: record.sharer.clone(),
                disclosed_to: record.disclosed_to.clone(),
                kind: record.kind,
                timestamp: record.timestamp.clone(),
            });
        }
    }
    outcome
}
