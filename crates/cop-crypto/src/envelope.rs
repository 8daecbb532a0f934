//! The protected-document envelope and its wire form.
//!
//! Wire format is one canonical JSON object (version "cop/1"): keys in
//! lexicographic order, binary fields base64url without padding. Fields are
//! kept in their encoded string form here; accessors decode on use. Struct
//! fields are declared in canonical key order, and serialization routes
//! through the canonical writer, so `to_canonical_vec` is the signed form.
//!
//! `parse` rejects any input that does not round-trip to identical bytes:
//! a re-encoded envelope is a different envelope, which is what keeps the
//! signature discipline sound.

use serde::{Deserialize, Serialize};

use crate::canonical::{b64_array, b64_decode, to_canonical_vec};
use crate::error::CoreError;

pub const VERSION: &str = "cop/1";

pub const TX_ID_LEN: usize = 16;
pub const WRAP_CT_LEN: usize = 48; // 32-byte key + 16-byte tag

/// A content key (or group key) wrapped to one recipient's long-term
/// X25519 public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WrappedKey {
    /// AEAD ciphertext of the 32-byte key (48 bytes with tag)
    pub ct: String,
    /// Ephemeral X25519 public key (32 bytes)
    pub eph_pub: String,
    /// Recipient party name
    pub name: String,
    /// AEAD nonce (12 bytes)
    pub nonce: String,
}

impl WrappedKey {
    fn validate(&self) -> Result<(), CoreError> {
        let _: [u8; 48] = b64_array(&self.ct)?;
        let _: [u8; 32] = b64_array(&self.eph_pub)?;
        let _: [u8; 12] = b64_array(&self.nonce)?;
        if self.name.is_empty() {
            return Err(CoreError::Malformed("wrap has empty recipient name"));
        }
        Ok(())
    }
}

/// The per-group wrap set: the group key wrapped to every member of the
/// membership snapshot taken at protect time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupWrapSet {
    pub group_id: String,
    /// Member snapshot, ordered as the resolver returned it
    pub members: Vec<String>,
    pub wraps: Vec<WrappedKey>,
}

impl GroupWrapSet {
    fn validate(&self) -> Result<(), CoreError> {
        if self.group_id.is_empty() {
            return Err(CoreError::Malformed("group wrap set has empty group id"));
        }
        for wrap in &self.wraps {
            wrap.validate()?;
        }
        // The snapshot and the wrap list must name the same members, in order.
        if self.members.len() != self.wraps.len()
            || self
                .members
                .iter()
                .zip(&self.wraps)
                .any(|(m, w)| *m != w.name)
        {
            return Err(CoreError::Malformed("group snapshot does not match wraps"));
        }
        if has_duplicates(self.members.iter()) {
            return Err(CoreError::Malformed("duplicate member in group wrap set"));
        }
        Ok(())
    }
}

/// Disclosure kind carried by a share record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareKind {
    Direct,
    Group,
}

/// A signed disclosure receipt. The signature covers the SHA-256 of the
/// canonical record with `sig` omitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShareRecord {
    /// Party name or group id the transaction was disclosed to
    pub disclosed_to: String,
    pub kind: ShareKind,
    /// Disclosing party name
    pub sharer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
    /// RFC 3339 timestamp, non-decreasing per sharer
    pub timestamp: String,
    pub tx_id: String,
}

impl ShareRecord {
    /// SHA-256 of the canonical record without its signature.
    pub fn signing_digest(&self) -> Result<[u8; 32], CoreError> {
        let unsigned = ShareRecord {
            sig: None,
            ..self.clone()
        };
        Ok(crate::hash::sha256(&to_canonical_vec(&unsigned)?))
    }

    pub fn sig_bytes(&self) -> Result<[u8; 64], CoreError> {
        match &self.sig {
            Some(sig) => b64_array(sig),
            None => Err(CoreError::Malformed("share record is unsigned")),
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        let _: [u8; TX_ID_LEN] = b64_array(&self.tx_id)?;
        if self.sharer.is_empty() || self.disclosed_to.is_empty() {
            return Err(CoreError::Malformed("share record has empty party field"));
        }
        if chrono::DateTime::parse_from_rfc3339(&self.timestamp).is_err() {
            return Err(CoreError::Malformed("share record timestamp not rfc3339"));
        }
        if let Some(sig) = &self.sig {
            let _: [u8; 64] = b64_array(sig)?;
        }
        Ok(())
    }
}

/// A post-protect appendix: a signed share record, plus the content-key
/// rewrap it authorizes when the disclosure grants read access.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Addendum {
    pub share_record: ShareRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap: Option<WrappedKey>,
}

/// The protected-document envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    /// Post-protect disclosures; outside seller-signature coverage, each
    /// authenticated by its own share record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addenda: Vec<Addendum>,
    /// Buyer party name, empty until a buyer is named
    pub buyer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_sig: Option<String>,
    pub content_ct: String,
    pub content_hash: String,
    pub content_nonce: String,
    pub direct_recipients: Vec<WrappedKey>,
    pub group_recipients: Vec<GroupWrapSet>,
    pub seller: String,
    pub seller_sig: String,
    pub tx_id: String,
    pub version: String,
}

/// The seller/buyer signing input: the protect-time envelope fields with
/// the signatures and addenda left out, in canonical key order.
#[derive(Serialize)]
struct SigningInput<'a> {
    buyer: &'a str,
    content_ct: &'a str,
    content_hash: &'a str,
    content_nonce: &'a str,
    direct_recipients: &'a [WrappedKey],
    group_recipients: &'a [GroupWrapSet],
    seller: &'a str,
    tx_id: &'a str,
    version: &'a str,
}

impl Envelope {
    /// Parse wire bytes, enforcing structure and canonical form.
    pub fn parse(bytes: &[u8]) -> Result<Self, CoreError> {
        let envelope: Envelope = serde_json::from_slice(bytes)
            .map_err(|_| CoreError::Malformed("envelope does not parse"))?;
        envelope.validate()?;
        if envelope.to_canonical_vec()? != bytes {
            return Err(CoreError::Malformed("envelope is not in canonical form"));
        }
        Ok(envelope)
    }

    /// Canonical wire bytes of the whole envelope.
    pub fn to_canonical_vec(&self) -> Result<Vec<u8>, CoreError> {
        to_canonical_vec(self)
    }

    /// Canonical bytes covered by the seller and buyer signatures.
    pub fn signing_input(&self) -> Result<Vec<u8>, CoreError> {
        to_canonical_vec(&SigningInput {
            buyer: &self.buyer,
            content_ct: &self.content_ct,
            content_hash: &self.content_hash,
            content_nonce: &self.content_nonce,
            direct_recipients: &self.direct_recipients,
            group_recipients: &self.group_recipients,
            seller: &self.seller,
            tx_id: &self.tx_id,
            version: &self.version,
        })
    }

    /// Structural checks: field shapes, lengths, and the no-duplicate
    /// recipient invariant. Signature validity is the check pipeline's job.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.version != VERSION {
            return Err(CoreError::Malformed("unsupported envelope version"));
        }
        if self.seller.is_empty() {
            return Err(CoreError::Malformed("envelope has empty seller"));
        }
        let _: [u8; TX_ID_LEN] = b64_array(&self.tx_id)?;
        let _: [u8; 12] = b64_array(&self.content_nonce)?;
        let _: [u8; 32] = b64_array(&self.content_hash)?;
        let _: [u8; 64] = b64_array(&self.seller_sig)?;
        if let Some(sig) = &self.buyer_sig {
            let _: [u8; 64] = b64_array(sig)?;
            if self.buyer.is_empty() {
                return Err(CoreError::Malformed("buyer signature without buyer"));
            }
        }
        if b64_decode(&self.content_ct)?.len() < crate::aead::TAG_LEN {
            return Err(CoreError::Malformed("content ciphertext too short"));
        }

        for wrap in &self.direct_recipients {
            wrap.validate()?;
        }
        if has_duplicates(self.direct_recipients.iter().map(|w| &w.name)) {
            return Err(CoreError::Malformed("duplicate direct recipient"));
        }

        for set in &self.group_recipients {
            set.validate()?;
        }
        if has_duplicates(self.group_recipients.iter().map(|s| &s.group_id)) {
            return Err(CoreError::Malformed("duplicate group wrap set"));
        }

        for addendum in &self.addenda {
            addendum.share_record.validate()?;
            if addendum.share_record.tx_id != self.tx_id {
                return Err(CoreError::Malformed("addendum references other tx"));
            }
            if addendum.share_record.sig.is_none() {
                return Err(CoreError::Malformed("addendum record is unsigned"));
            }
            if let Some(wrap) = &addendum.wrap {
                wrap.validate()?;
            }
        }
        Ok(())
    }

    pub fn tx_id_bytes(&self) -> Result<[u8; TX_ID_LEN], CoreError> {
        b64_array(&self.tx_id)
    }

    pub fn content_nonce_bytes(&self) -> Result<[u8; 12], CoreError> {
        b64_array(&self.content_nonce)
    }

    pub fn content_hash_bytes(&self) -> Result<[u8; 32], CoreError> {
        b64_array(&self.content_hash)
    }

    pub fn content_ct_bytes(&self) -> Result<Vec<u8>, CoreError> {
        b64_decode(&self.content_ct)
    }

    pub fn seller_sig_bytes(&self) -> Result<[u8; 64], CoreError> {
        b64_array(&self.seller_sig)
    }

    /// AAD binding the content ciphertext to tx id, seller, and buyer.
    pub fn content_aad(&self) -> Result<Vec<u8>, CoreError> {
        let tx_id = self.tx_id_bytes()?;
        let mut aad =
            Vec::with_capacity(TX_ID_LEN + self.seller.len() + self.buyer.len());
        aad.extend_from_slice(&tx_id);
        aad.extend_from_slice(self.seller.as_bytes());
        aad.extend_from_slice(self.buyer.as_bytes());
        Ok(aad)
    }
}

fn has_duplicates<'a, I>(names: I) -> bool
where
    I: Iterator<Item = &'a String>,
{
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return true;
        }
    }
    false
}
