//! Buyer signature and the disclosure protocol: share records and addenda.
//!
//! A share record is the signed receipt of one disclosure. Addenda carry
//! the content-key rewraps that realize a disclosure; each addendum entry
//! pairs one rewrap with the record that authorizes it. The protect-time
//! seller signature never covers addenda.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::canonical::b64;
use crate::directory::PublicKeyDirectory;
use crate::envelope::{Addendum, Envelope, ShareKind, ShareRecord};
use crate::error::CoreError;
use crate::groups::GroupResolver;
use crate::identity::IdentityKeyPair;
use crate::keystore::FileKeyStore;
use crate::wrap::wrap;

/// Attach (or replace) the buyer signature on an envelope. Everything but
/// `buyer_sig` stays byte-identical, so the seller signature remains valid.
pub fn buyer_sign(
    envelope: &mut Envelope,
    buyer: &str,
    buyer_keys: &IdentityKeyPair,
) -> Result<(), CoreError> {
    if buyer.is_empty() || envelope.buyer != buyer {
        return Err(CoreError::WrongBuyer);
    }
    let signing_input = envelope.signing_input()?;
    envelope.buyer_sig = Some(b64(&buyer_keys.sign(&signing_input)));
    Ok(())
}

/// Buyer-sign, loading the buyer's identity from the key store.
pub fn buyer_sign_with_store(
    envelope: &mut Envelope,
    buyer: &str,
    keystore: &FileKeyStore,
) -> Result<(), CoreError> {
    if buyer.is_empty() || envelope.buyer != buyer {
        // Name mismatch beats key lookup so impostors learn nothing more.
        return Err(CoreError::WrongBuyer);
    }
    let buyer_keys = keystore.load(buyer)?;
    buyer_sign(envelope, buyer, &buyer_keys)
}

/// Build and sign a share record for one disclosure.
pub fn sign_share_record(
    tx_id: &str,
    sharer_name: &str,
    sharer_keys: &IdentityKeyPair,
    disclosed_to: &str,
    kind: ShareKind,
    timestamp: DateTime<Utc>,
) -> Result<ShareRecord, CoreError> {
    let mut record = ShareRecord {
        disclosed_to: disclosed_to.to_string(),
        kind,
        sharer: sharer_name.to_string(),
        sig: None,
        timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        tx_id: tx_id.to_string(),
    };
    let digest = record.signing_digest()?;
    record.sig = Some(b64(&sharer_keys.sign(&digest)));
    Ok(record)
}

/// Verify a share record signature against the sharer's directory key.
pub fn verify_share_record(
    record: &ShareRecord,
    directory: &dyn PublicKeyDirectory,
) -> Result<(), CoreError> {
    let publics = directory
        .publics(&record.sharer)
        .ok_or_else(|| CoreError::UnknownParty(record.sharer.clone()))?;
    let digest = record.signing_digest()?;
    let sig = record.sig_bytes()?;
    crate::identity::verify_signature(&publics.signing, &digest, &sig)
}

/// Disclose to one party: a fresh content-key wrap plus its signed record.
/// The sharer must already hold the content key.
pub fn build_direct_addendum(
    envelope: &Envelope,
    sharer_name: &str,
    sharer_keys: &IdentityKeyPair,
    to: &str,
    content_key: &[u8; 32],
    directory: &dyn PublicKeyDirectory,
    timestamp: DateTime<Utc>,
) -> Result<Addendum, CoreError> {
    let publics = directory
        .publics(to)
        .ok_or_else(|| CoreError::UnknownParty(to.to_string()))?;
    let record = sign_share_record(
        &envelope.tx_id,
        sharer_name,
        sharer_keys,
        to,
        ShareKind::Direct,
        timestamp,
    )?;
    let wrapped = wrap(content_key, to, &publics.enc)?;
    debug!(sharer = sharer_name, to, "built direct disclosure addendum");
    Ok(Addendum {
        share_record: record,
        wrap: Some(wrapped),
    })
}

/// Disclose to a group: one signed record for the group, and a content-key
/// rewrap for every member of the share-time snapshot. Members removed
/// before this moment get nothing; members added since protect time are
/// included, because disclosure is governed by share-time membership.
pub fn build_group_addenda(
    envelope: &Envelope,
    sharer_name: &str,
    sharer_keys: &IdentityKeyPair,
    group_id: &str,
    content_key: &[u8; 32],
    directory: &dyn PublicKeyDirectory,
    resolver: &dyn GroupResolver,
    timestamp: DateTime<Utc>,
) -> Result<Vec<Addendum>, CoreError> {
    let snapshot = resolver
        .snapshot(group_id)
        .ok_or_else(|| CoreError::UnknownGroup(group_id.to_string()))?;
    let record = sign_share_record(
        &envelope.tx_id,
        sharer_name,
        sharer_keys,
        group_id,
        ShareKind::Group,
        timestamp,
    )?;

    if snapshot.members.is_empty() {
        // An empty snapshot still leaves an audit trail.
        return Ok(vec![Addendum {
            share_record: record,
            wrap: None,
        }]);
    }

    let mut addenda = Vec::with_capacity(snapshot.members.len());
    for member in &snapshot.members {
        let publics = directory
            .publics(member)
            .ok_or_else(|| CoreError::UnknownParty(member.clone()))?;
        addenda.push(Addendum {
            share_record: record.clone(),
            wrap: Some(wrap(content_key, member, &publics.enc)?),
        });
    }
    debug!(
        sharer = sharer_name,
        group_id,
        members = addenda.len(),
        "built group disclosure addenda"
    );
    Ok(addenda)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::check;
    use crate::directory::{InMemoryDirectory, PartyPublics};
    use crate::groups::InMemoryGroups;
    use crate::protect::{protect, ProtectRequest};
    use crate::unprotect::{recover_content_key, unprotect};
    use chrono::TimeZone;

    fn publish(directory: &InMemoryDirectory, name: &str) -> IdentityKeyPair {
        let identity = IdentityKeyPair::generate();
        directory.publish(
            name,
            PartyPublics {
                signing: identity.signing_public(),
                enc: identity.enc_public(),
            },
        );
        identity
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn test_buyer_sign_keeps_seller_signature() {
        let directory = InMemoryDirectory::new();
        let groups = InMemoryGroups::new();
        let seller = publish(&directory, "Seller Co");
        let buyer = publish(&directory, "Lays Chips");

        let mut envelope = protect(
            &ProtectRequest {
                content: b"payload",
                seller: "Seller Co",
                buyer: "Lays Chips",
                recipients: &[],
                groups: &[],
            },
            &seller,
            &directory,
            &groups,
        )
        .unwrap();

        buyer_sign(&mut envelope, "Lays Chips", &buyer).unwrap();

        let report = check(&envelope, &directory);
        assert!(report.seller_sig_valid);
        assert_eq!(report.buyer_sig_valid, Some(true));
    }

    #[test]
    fn test_buyer_sign_wrong_name() {
        let directory = InMemoryDirectory::new();
        let groups = InMemoryGroups::new();
        let seller = publish(&directory, "Seller Co");
        let random = publish(&directory, "Random Co");

        let mut envelope = protect(
            &ProtectRequest {
                content: b"payload",
                seller: "Seller Co",
                buyer: "Lays Chips",
                recipients: &[],
                groups: &[],
            },
            &seller,
            &directory,
            &groups,
        )
        .unwrap();

        assert!(matches!(
            buyer_sign(&mut envelope, "Random Co", &random),
            Err(CoreError::WrongBuyer)
        ));
        assert!(envelope.buyer_sig.is_none());
    }

    #[test]
    fn test_buyer_sign_without_buyer_named() {
        let directory = InMemoryDirectory::new();
        let groups = InMemoryGroups::new();
        let seller = publish(&directory, "Seller Co");

        let mut envelope = protect(
            &ProtectRequest {
                content: b"payload",
                seller: "Seller Co",
                buyer: "",
                recipients: &[],
                groups: &[],
            },
            &seller,
            &directory,
            &groups,
        )
        .unwrap();

        // Buyer was never named; the buyer identity is signature-bound at
        // protect time, so every buyer-sign attempt fails.
        assert!(matches!(
            buyer_sign(&mut envelope, "Seller Co", &seller),
            Err(CoreError::WrongBuyer)
        ));
    }

    #[test]
    fn test_share_record_sign_and_verify() {
        let directory = InMemoryDirectory::new();
        let sharer = publish(&directory, "Lays Chips");

        let record = sign_share_record(
            &b64(&[7u8; 16]),
            "Lays Chips",
            &sharer,
            "Auditor Corp",
            ShareKind::Direct,
            ts(),
        )
        .unwrap();

        verify_share_record(&record, &directory).unwrap();

        let mut tampered = record.clone();
        tampered.disclosed_to = "Mallory Inc".to_string();
        assert!(matches!(
            verify_share_record(&tampered, &directory),
            Err(CoreError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_direct_addendum_grants_access() {
        let directory = InMemoryDirectory::new();
        let groups = InMemoryGroups::new();
        let seller = publish(&directory, "Seller Co");
        let buyer = publish(&directory, "Lays Chips");
        let late = publish(&directory, "Late Reader");

        let mut envelope = protect(
            &ProtectRequest {
                content: b"the goods",
                seller: "Seller Co",
                buyer: "Lays Chips",
                recipients: &[],
                groups: &[],
            },
            &seller,
            &directory,
            &groups,
        )
        .unwrap();

        let content_key =
            recover_content_key(&envelope, "Lays Chips", &buyer, &directory).unwrap();
        let addendum = build_direct_addendum(
            &envelope,
            "Lays Chips",
            &buyer,
            "Late Reader",
            &content_key,
            &directory,
            ts(),
        )
        .unwrap();
        envelope.addenda.push(addendum);

        let recovered = unprotect(&envelope, "Late Reader", &late, &directory).unwrap();
        assert_eq!(recovered, b"the goods");

        let report = check(&envelope, &directory);
        assert!(report.seller_sig_valid);
        assert!(report.addenda[0].record_sig_valid);
    }

    #[test]
    fn test_forged_addendum_grants_nothing() {
        let directory = InMemoryDirectory::new();
        let groups = InMemoryGroups::new();
        let seller = publish(&directory, "Seller Co");
        let intruder = IdentityKeyPair::generate();
        publish(&directory, "Shady Corp");

        let mut envelope = protect(
            &ProtectRequest {
                content: b"the goods",
                seller: "Seller Co",
                buyer: "",
                recipients: &[],
                groups: &[],
            },
            &seller,
            &directory,
            &groups,
        )
        .unwrap();

        // An addendum signed by a key that is not the sharer's published
        // key does not verify, so its wrap is never consulted.
        let content_key: [u8; 32] = crate::rng::random_bytes().unwrap();
        let addendum = build_direct_addendum(
            &envelope,
            "Shady Corp",
            &intruder,
            "Shady Corp",
            &content_key,
            &directory,
            ts(),
        )
        .unwrap();
        envelope.addenda.push(addendum);

        let report = check(&envelope, &directory);
        assert!(!report.addenda[0].record_sig_valid);

        let shady = IdentityKeyPair::generate();
        assert!(unprotect(&envelope, "Shady Corp", &shady, &directory).is_err());
    }

    #[test]
    fn test_group_addenda_follow_share_time_snapshot() {
        let directory = InMemoryDirectory::new();
        let groups = InMemoryGroups::new();
        let seller = publish(&directory, "Seller Co");
        let buyer = publish(&directory, "Lays Chips");
        publish(&directory, "Auditor Corp");
        publish(&directory, "New Member");
        groups.add_member("tech_partners", "Auditor Corp");

        let envelope = protect(
            &ProtectRequest {
                content: b"group payload",
                seller: "Seller Co",
                buyer: "Lays Chips",
                recipients: &[],
                groups: &["tech_partners".to_string()],
            },
            &seller,
            &directory,
            &groups,
        )
        .unwrap();

        // Membership changes between protect and share.
        groups.remove_member("tech_partners", "Auditor Corp");
        groups.add_member("tech_partners", "New Member");

        let content_key =
            recover_content_key(&envelope, "Lays Chips", &buyer, &directory).unwrap();
        let addenda = build_group_addenda(
            &envelope,
            "Lays Chips",
            &buyer,
            "tech_partners",
            &content_key,
            &directory,
            &groups,
            ts(),
        )
        .unwrap();

        let names: Vec<&str> = addenda
            .iter()
            .filter_map(|a| a.wrap.as_ref())
            .map(|w| w.name.as_str())
            .collect();
        assert_eq!(names, vec!["New Member"]);
        assert!(addenda
            .iter()
            .all(|a| a.share_record.kind == ShareKind::Group
                && a.share_record.disclosed_to == "tech_partners"));
    }
}
