//! Seller-side protection pipeline.
//!
//! Encrypts the transaction once under a fresh content key, wraps that key
//! for every direct recipient, wraps the per-group derived key for every
//! member of each group's membership snapshot, and signs the canonical
//! envelope form. Either the whole envelope is produced or nothing is.

use tracing::debug;
use zeroize::Zeroizing;

use crate::aead::aead_seal;
use crate::canonical::b64;
use crate::directory::PublicKeyDirectory;
use crate::envelope::{Envelope, GroupWrapSet, VERSION};
use crate::error::CoreError;
use crate::groups::GroupResolver;
use crate::hash::sha256;
use crate::identity::IdentityKeyPair;
use crate::kdf::derive_group_key;
use crate::keystore::FileKeyStore;
use crate::rng::random_bytes;
use crate::wrap::wrap;

/// Addressing and content for one protection run.
pub struct ProtectRequest<'a> {
    /// Transaction content, treated as opaque bytes
    pub content: &'a [u8],
    pub seller: &'a str,
    /// May be empty until a later re-protect names a buyer
    pub buyer: &'a str,
    /// Named recipients beyond seller and buyer
    pub recipients: &'a [String],
    /// Group ids whose current members receive entitlement wraps
    pub groups: &'a [String],
}

/// Protect a transaction with the seller's loaded identity.
pub fn protect(
    req: &ProtectRequest<'_>,
    seller_keys: &IdentityKeyPair,
    directory: &dyn PublicKeyDirectory,
    resolver: &dyn GroupResolver,
) -> Result<Envelope, CoreError> {
    if req.seller.is_empty() {
        return Err(CoreError::Malformed("seller name is empty"));
    }

    let tx_id: [u8; 16] = random_bytes()?;
    let content_key: Zeroizing<[u8; 32]> = Zeroizing::new(random_bytes()?);
    let content_nonce: [u8; 12] = random_bytes()?;

    let mut aad = Vec::with_capacity(16 + req.seller.len() + req.buyer.len());
    aad.extend_from_slice(&tx_id);
    aad.extend_from_slice(req.seller.as_bytes());
    aad.extend_from_slice(req.buyer.as_bytes());

    let content_ct = aead_seal(&content_key, &content_nonce, req.content, &aad)?;
    let content_hash = sha256(req.content);

    // Direct recipients: seller first, buyer second, then the given order,
    // deduplicated on first occurrence.
    let mut names: Vec<&str> = Vec::with_capacity(2 + req.recipients.len());
    names.push(req.seller);
    if !req.buyer.is_empty() {
        names.push(req.buyer);
    }
    names.extend(req.recipients.iter().map(String::as_str));
    let mut seen = std::collections::HashSet::new();
    names.retain(|n| seen.insert(*n));

    let mut direct_recipients = Vec::with_capacity(names.len());
    for name in &names {
        let publics = directory
            .publics(name)
            .ok_or_else(|| CoreError::UnknownParty(name.to_string()))?;
        direct_recipients.push(wrap(&content_key, name, &publics.enc)?);
    }

    let mut group_recipients = Vec::with_capacity(req.groups.len());
    for group_id in req.groups {
        let snapshot = resolver
            .snapshot(group_id)
            .ok_or_else(|| CoreError::UnknownGroup(group_id.clone()))?;
        let group_key = Zeroizing::new(derive_group_key(&content_key, &tx_id, group_id));

        let mut wraps = Vec::with_capacity(snapshot.members.len());
        for member in &snapshot.members {
            // A member with no published key fails the whole run; silently
            // skipping would punch a hole in the snapshot invariant.
            let publics = directory
                .publics(member)
                .ok_or_else(|| CoreError::UnknownParty(member.clone()))?;
            wraps.push(wrap(&group_key, member, &publics.enc)?);
        }
        group_recipients.push(GroupWrapSet {
            group_id: group_id.clone(),
            members: snapshot.members,
            wraps,
        });
    }

    let mut envelope = Envelope {
        addenda: Vec::new(),
        buyer: req.buyer.to_string(),
        buyer_sig: None,
        content_ct: b64(&content_ct),
        content_hash: b64(&content_hash),
        content_nonce: b64(&content_nonce),
        direct_recipients,
        group_recipients,
        seller: req.seller.to_string(),
        seller_sig: String::new(),
        tx_id: b64(&tx_id),
        version: VERSION.to_string(),
    };

    let signing_input = envelope.signing_input()?;
    envelope.seller_sig = b64(&seller_keys.sign(&signing_input));

    debug!(
        tx_id = %hex::encode(tx_id),
        direct = envelope.direct_recipients.len(),
        groups = envelope.group_recipients.len(),
        "protected transaction"
    );
    Ok(envelope)
}

/// Protect, loading the seller's identity from the key store.
pub fn protect_with_store(
    req: &ProtectRequest<'_>,
    keystore: &FileKeyStore,
    directory: &dyn PublicKeyDirectory,
    resolver: &dyn GroupResolver,
) -> Result<Envelope, CoreError> {
    let seller_keys = keystore.load(req.seller)?;
    protect(req, &seller_keys, directory, resolver)
}
