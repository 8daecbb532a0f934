//! Recipient-side pipeline: verify, locate a usable wrap, unwrap, decrypt.
//!
//! Content is sealed once, under the content key. Direct recipients and
//! parties named by verified disclosure addenda hold content-key wraps; a
//! protect-time group wrap carries only the per-group entitlement key and
//! does not by itself read content.

use tracing::debug;
use zeroize::Zeroizing;

use crate::aead::aead_open;
use crate::check::check;
use crate::directory::PublicKeyDirectory;
use crate::envelope::Envelope;
use crate::error::CoreError;
use crate::hash::sha256;
use crate::identity::IdentityKeyPair;
use crate::keystore::FileKeyStore;
use crate::utils::constant_time_compare_array;
use crate::wrap::unwrap;

/// Proof that a party sits in a group's protect-time snapshot: the unwrapped
/// per-group key. Entitles its holder to request disclosure from a sharer;
/// it never decrypts content.
pub struct GroupEntitlement {
    pub group_id: String,
    pub group_key: Zeroizing<[u8; 32]>,
}

/// Recover the content key as `recipient`, searching direct wraps first and
/// then wraps carried by verified addenda.
pub fn recover_content_key(
    envelope: &Envelope,
    recipient: &str,
    recipient_keys: &IdentityKeyPair,
    directory: &dyn PublicKeyDirectory,
) -> Result<Zeroizing<[u8; 32]>, CoreError> {
    let report = check(envelope, directory);
    if !report.envelope_well_formed {
        return Err(CoreError::Malformed("envelope failed structural checks"));
    }
    if !report.seller_sig_valid {
        return Err(CoreError::SignatureInvalid);
    }
    if report.buyer_sig_valid == Some(false) {
        return Err(CoreError::SignatureInvalid);
    }

    if let Some(wrapped) = envelope
        .direct_recipients
        .iter()
        .find(|w| w.name == recipient)
    {
        // A wrap bearing the caller's name that fails to open is tampering
        // or a key mismatch, not absence.
        return unwrap(wrapped, recipient_keys.enc_secret());
    }

    let mut saw_candidate = false;
    for (index, addendum) in envelope.addenda.iter().enumerate() {
        let verified = report
            .addenda
            .get(index)
            .map(|a| a.record_sig_valid)
            .unwrap_or(false);
        let Some(wrapped) = &addendum.wrap else {
            continue;
        };
        if !verified || wrapped.name != recipient {
            continue;
        }
        saw_candidate = true;
        match unwrap(wrapped, recipient_keys.enc_secret()) {
            Ok(key) => return Ok(key),
            Err(_) => continue,
        }
    }
    if saw_candidate {
        return Err(CoreError::AuthFailure);
    }

    debug!(recipient, "no content-key wrap matched caller");
    Err(CoreError::NotARecipient)
}

/// Unprotect the envelope as `recipient`, returning the transaction bytes.
pub fn unprotect(
    envelope: &Envelope,
    recipient: &str,
    recipient_keys: &IdentityKeyPair,
    directory: &dyn PublicKeyDirectory,
) -> Result<Vec<u8>, CoreError> {
    let content_key = recover_content_key(envelope, recipient, recipient_keys, directory)?;

    let nonce = envelope.content_nonce_bytes()?;
    let ct = envelope.content_ct_bytes()?;
    let aad = envelope.content_aad()?;
    let content = aead_open(&content_key, &nonce, &ct, &aad)?;

    // Defense in depth: the AEAD already authenticates the content when the
    // signature chain is intact.
    let expected = envelope.content_hash_bytes()?;
    if !constant_time_compare_array(&sha256(&content), &expected) {
        return Err(CoreError::AuthFailure);
    }

    Ok(content)
}

/// Unprotect, loading the recipient's identity from the key store.
pub fn unprotect_with_store(
    envelope: &Envelope,
    recipient: &str,
    keystore: &FileKeyStore,
    directory: &dyn PublicKeyDirectory,
) -> Result<Vec<u8>, CoreError> {
    let recipient_keys = keystore.load(recipient)?;
    unprotect(envelope, recipient, &recipient_keys, directory)
}

/// Unwrap the caller's group entitlement, if any group snapshot names them.
pub fn group_entitlement(
    envelope: &Envelope,
    recipient: &str,
    recipient_keys: &IdentityKeyPair,
) -> Result<Option<GroupEntitlement>, CoreError> {
    for set in &envelope.group_recipients {
        let Some(wrapped) = set.wraps.iter().find(|w| w.name == recipient) else {
            continue;
        };
        let group_key = unwrap(wrapped, recipient_keys.enc_secret())?;
        return Ok(Some(GroupEntitlement {
            group_id: set.group_id.clone(),
            group_key,
        }));
    }
    Ok(None)
}
