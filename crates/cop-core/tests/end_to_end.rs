//! End-to-end flows: protect, check, buyer-sign, unprotect, disclosure,
//! and audit over the in-memory collaborators.

use cop_core::audit::audit_transaction;
use cop_core::sharing::DisclosureService;
use cop_core::store::{InMemoryStore, TransactionStore};
use cop_crypto::canonical::{b64, b64_decode};
use cop_crypto::check::check;
use cop_crypto::directory::{InMemoryDirectory, PartyPublics};
use cop_crypto::envelope::Envelope;
use cop_crypto::groups::InMemoryGroups;
use cop_crypto::identity::IdentityKeyPair;
use cop_crypto::protect::{protect, ProtectRequest};
use cop_crypto::share::buyer_sign;
use cop_crypto::unprotect::unprotect;
use cop_crypto::CoreError;

const TRANSACTION: &[u8] = br#"{"item":"lithium","qty":100,"price":"USD 50000"}"#;

struct World {
    directory: InMemoryDirectory,
    groups: InMemoryGroups,
    parties: std::collections::HashMap<String, IdentityKeyPair>,
}

impl World {
    fn new(names: &[&str]) -> Self {
        let directory = InMemoryDirectory::new();
        let mut parties = std::collections::HashMap::new();
        for name in names {
            let identity = IdentityKeyPair::generate();
            directory.publish(
                name,
                PartyPublics {
                    signing: identity.signing_public(),
                    enc: identity.enc_public(),
                },
            );
            parties.insert(name.to_string(), identity);
        }
        Self {
            directory,
            groups: InMemoryGroups::new(),
            parties,
        }
    }

    fn keys(&self, name: &str) -> &IdentityKeyPair {
        &self.parties[name]
    }

    fn protect(
        &self,
        seller: &str,
        buyer: &str,
        recipients: &[String],
        groups: &[String],
    ) -> Envelope {
        protect(
            &ProtectRequest {
                content: TRANSACTION,
                seller,
                buyer,
                recipients,
                groups,
            },
            self.keys(seller),
            &self.directory,
            &self.groups,
        )
        .unwrap()
    }
}

// S1: protect for a named recipient; the recipient reads it back exactly,
// an outsider gets NotARecipient.
#[tokio::test]
async fn s1_protect_check_unprotect() {
    let world = World::new(&[
        "Ching Chong Extractions",
        "Lays Chips",
        "Auditor Corp",
        "Random Co",
    ]);
    let envelope = world.protect(
        "Ching Chong Extractions",
        "Lays Chips",
        &["Auditor Corp".to_string()],
        &[],
    );

    let report = check(&envelope, &world.directory);
    assert!(report.envelope_well_formed);
    assert!(report.seller_sig_valid);
    assert_eq!(report.buyer_sig_valid, None);

    let content = unprotect(
        &envelope,
        "Auditor Corp",
        world.keys("Auditor Corp"),
        &world.directory,
    )
    .unwrap();
    assert_eq!(content, TRANSACTION);

    assert!(matches!(
        unprotect(
            &envelope,
            "Random Co",
            world.keys("Random Co"),
            &world.directory,
        ),
        Err(CoreError::NotARecipient)
    ));
}

// S2: buyer-sign succeeds for the named buyer and nobody else.
#[tokio::test]
async fn s2_buyer_sign() {
    let world = World::new(&["Ching Chong Extractions", "Lays Chips", "Random Co"]);
    let mut envelope = world.protect("Ching Chong Extractions", "Lays Chips", &[], &[]);

    buyer_sign(&mut envelope, "Lays Chips", world.keys("Lays Chips")).unwrap();
    let report = check(&envelope, &world.directory);
    assert!(report.seller_sig_valid);
    assert_eq!(report.buyer_sig_valid, Some(true));

    assert!(matches!(
        buyer_sign(&mut envelope, "Random Co", world.keys("Random Co")),
        Err(CoreError::WrongBuyer)
    ));
}

// S3: group snapshot freeze. A protect-time member reads via a
// buyer-initiated group share; a member added after protect stays out of
// the original envelope's wraps.
#[tokio::test]
async fn s3_group_snapshot_freeze() {
    let world = World::new(&["Ching Chong Extractions", "Lays Chips", "Auditor Corp"]);
    world.groups.add_member("tech_partners", "Auditor Corp");

    let envelope = world.protect(
        "Ching Chong Extractions",
        "Lays Chips",
        &[],
        &["tech_partners".to_string()],
    );
    assert_eq!(
        envelope.group_recipients[0].members,
        vec!["Auditor Corp".to_string()]
    );
    let tx_id = envelope.tx_id.clone();

    // Added after protect: not in the snapshot, no access.
    world.groups.add_member("tech_partners", "Lays Chips");

    let store = InMemoryStore::new();
    store.put_envelope(envelope).await.unwrap();

    // Before any share, bare membership grants nothing.
    {
        let stored = store.get_envelope(&tx_id).await.unwrap();
        assert!(matches!(
            unprotect(
                &stored,
                "Auditor Corp",
                world.keys("Auditor Corp"),
                &world.directory,
            ),
            Err(CoreError::NotARecipient)
        ));
    }

    let service = DisclosureService::new(&store);
    service
        .share_group(
            &tx_id,
            "Lays Chips",
            world.keys("Lays Chips"),
            "tech_partners",
            &world.directory,
            &world.groups,
        )
        .await
        .unwrap();

    let stored = store.get_envelope(&tx_id).await.unwrap();
    let content = unprotect(
        &stored,
        "Auditor Corp",
        world.keys("Auditor Corp"),
        &world.directory,
    )
    .unwrap();
    assert_eq!(content, TRANSACTION);
}

// S3 continued: a member removed before a later share is excluded from
// that share's wrap set, while past access stays (offline envelopes are
// not revocable).
#[tokio::test]
async fn s3_removed_member_excluded_from_later_share() {
    let world = World::new(&[
        "Ching Chong Extractions",
        "Lays Chips",
        "Auditor Corp",
        "New Partner",
    ]);
    world.groups.add_member("tech_partners", "Auditor Corp");

    let envelope = world.protect(
        "Ching Chong Extractions",
        "Lays Chips",
        &[],
        &["tech_partners".to_string()],
    );
    let tx_id = envelope.tx_id.clone();
    let store = InMemoryStore::new();
    store.put_envelope(envelope).await.unwrap();

    let service = DisclosureService::new(&store);
    service
        .share_group(
            &tx_id,
            "Lays Chips",
            world.keys("Lays Chips"),
            "tech_partners",
            &world.directory,
            &world.groups,
        )
        .await
        .unwrap();

    // Membership churn after the first disclosure.
    world.groups.remove_member("tech_partners", "Auditor Corp");
    world.groups.add_member("tech_partners", "New Partner");

    service
        .share_group(
            &tx_id,
            "Lays Chips",
            world.keys("Lays Chips"),
            "tech_partners",
            &world.directory,
            &world.groups,
        )
        .await
        .unwrap();

    let stored = store.get_envelope(&tx_id).await.unwrap();
    let wrapped_names: Vec<&str> = stored
        .addenda
        .iter()
        .filter_map(|a| a.wrap.as_ref())
        .map(|w| w.name.as_str())
        .collect();
    // First share reached the then-member; the post-removal share did not.
    assert_eq!(wrapped_names, vec!["Auditor Corp", "New Partner"]);

    assert!(unprotect(
        &stored,
        "New Partner",
        world.keys("New Partner"),
        &world.directory,
    )
    .is_ok());
    // Past access is not revocable: the earlier disclosure still reads.
    assert!(unprotect(
        &stored,
        "Auditor Corp",
        world.keys("Auditor Corp"),
        &world.directory,
    )
    .is_ok());
}

// S4: a flipped content byte is never silently accepted.
#[tokio::test]
async fn s4_tampered_content() {
    let world = World::new(&["Ching Chong Extractions", "Lays Chips"]);
    let envelope = world.protect("Ching Chong Extractions", "Lays Chips", &[], &[]);

    let mut tampered = envelope.clone();
    let mut ct = b64_decode(&tampered.content_ct).unwrap();
    ct[0] ^= 0x01;
    tampered.content_ct = b64(&ct);

    let report = check(&tampered, &world.directory);
    assert!(!report.seller_sig_valid);

    let err = unprotect(
        &tampered,
        "Lays Chips",
        world.keys("Lays Chips"),
        &world.directory,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CoreError::SignatureInvalid | CoreError::AuthFailure
    ));
}

// S5: the audited disclosure set is exactly what the sharer disclosed.
#[tokio::test]
async fn s5_audit_completeness() {
    let world = World::new(&[
        "Ching Chong Extractions",
        "Lays Chips",
        "Auditor Corp",
        "Partner A",
    ]);
    world.groups.add_member("tech_partners", "Partner A");

    let envelope = world.protect("Ching Chong Extractions", "Lays Chips", &[], &[]);
    let tx_id = envelope.tx_id.clone();
    let store = InMemoryStore::new();
    store.put_envelope(envelope).await.unwrap();

    let service = DisclosureService::new(&store);
    service
        .share_direct(
            &tx_id,
            "Lays Chips",
            world.keys("Lays Chips"),
            "Auditor Corp",
            &world.directory,
        )
        .await
        .unwrap();
    service
        .share_group(
            &tx_id,
            "Lays Chips",
            world.keys("Lays Chips"),
            "tech_partners",
            &world.directory,
            &world.groups,
        )
        .await
        .unwrap();

    let report = audit_transaction(&store, &world.directory, &tx_id)
        .await
        .unwrap();
    assert!(report.clean());

    let disclosed: Vec<&str> = report
        .edges
        .iter()
        .map(|e| e.disclosed_to.as_str())
        .collect();
    assert_eq!(disclosed, vec!["Auditor Corp", "tech_partners"]);
    assert!(report.edges.iter().all(|e| e.sharer == "Lays Chips"));
}

// S6: identical inputs, independent envelopes.
#[tokio::test]
async fn s6_independent_envelopes() {
    let world = World::new(&["Ching Chong Extractions", "Lays Chips"]);
    let a = world.protect("Ching Chong Extractions", "Lays Chips", &[], &[]);
    let b = world.protect("Ching Chong Extractions", "Lays Chips", &[], &[]);

    assert_ne!(a.tx_id, b.tx_id);
    assert_ne!(a.content_nonce, b.content_nonce);
    assert_ne!(
        a.direct_recipients[0].eph_pub,
        b.direct_recipients[0].eph_pub
    );
    assert_ne!(a.direct_recipients[0].nonce, b.direct_recipients[0].nonce);

    for envelope in [&a, &b] {
        let content = unprotect(
            envelope,
            "Lays Chips",
            world.keys("Lays Chips"),
            &world.directory,
        )
        .unwrap();
        assert_eq!(content, TRANSACTION);
    }
}

// Wire round trip through the store boundary: canonical bytes in, the same
// canonical bytes out.
#[tokio::test]
async fn wire_round_trip_through_store() {
    let world = World::new(&["Ching Chong Extractions", "Lays Chips"]);
    let envelope = world.protect("Ching Chong Extractions", "Lays Chips", &[], &[]);
    let bytes = envelope.to_canonical_vec().unwrap();

    let parsed = Envelope::parse(&bytes).unwrap();
    let store = InMemoryStore::new();
    store.put_envelope(parsed).await.unwrap();

    let stored = store.get_envelope(&envelope.tx_id).await.unwrap();
    assert_eq!(stored.to_canonical_vec().unwrap(), bytes);
}
