//! Key wrapping: ephemeral X25519 + HKDF-SHA256 + AES-256-GCM.
//!
//! Wraps a 32-byte key to one recipient's long-term encryption public key.
//! The HKDF salt binds both the ephemeral and the recipient public key, and
//! the recipient public key rides as AAD, so a wrap cannot be replayed
//! toward a different recipient. Intermediate secrets are zeroized.

use rand_core::OsRng;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::aead::{aead_open, aead_seal};
use crate::canonical::{b64, b64_array, b64_decode};
use crate::envelope::{WrappedKey, WRAP_CT_LEN};
use crate::error::CoreError;
use crate::kdf::hkdf_sha256;
use crate::rng::random_bytes;

const WRAP_INFO: &[u8] = b"cop/wrap/v1";

fn wrap_key_for(shared: &[u8; 32], eph_pub: &[u8; 32], recipient_pub: &[u8; 32]) -> Zeroizing<[u8; 32]> {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(eph_pub);
    salt[32..].copy_from_slice(recipient_pub);
    let mut key = Zeroizing::new([0u8; 32]);
    hkdf_sha256(shared, &salt, WRAP_INFO, key.as_mut());
    key
}

/// Wrap `key` for the named recipient.
pub fn wrap(
    key: &[u8; 32],
    recipient_name: &str,
    recipient_enc_pub: &[u8; 32],
) -> Result<WrappedKey, CoreError> {
    let eph = EphemeralSecret::random_from_rng(OsRng);
    let eph_pub = *X25519PublicKey::from(&eph).as_bytes();

    let shared = Zeroizing::new(
        *eph.diffie_hellman(&X25519PublicKey::from(*recipient_enc_pub))
            .as_bytes(),
    );
    let wrap_key = wrap_key_for(&shared, &eph_pub, recipient_enc_pub);

    let nonce: [u8; 12] = random_bytes()?;
    let ct = aead_seal(&wrap_key, &nonce, key, recipient_enc_pub)?;

    Ok(WrappedKey {
        ct: b64(&ct),
        eph_pub: b64(&eph_pub),
        name: recipient_name.to_string(),
        nonce: b64(&nonce),
    })
}

/// Unwrap with the recipient's long-term encryption secret. Fails with
/// `AuthFailure` on any tamper or wrong-recipient attempt.
pub fn unwrap(wrapped: &WrappedKey, enc_secret: &StaticSecret) -> Result<Zeroizing<[u8; 32]>, CoreError> {
    let eph_pub: [u8; 32] = b64_array(&wrapped.eph_pub)?;
    let nonce: [u8; 12] = b64_array(&wrapped.nonce)?;
    let ct = b64_decode(&wrapped.ct)?;
    if ct.len() != WRAP_CT_LEN {
        return Err(CoreError::Malformed("wrap ciphertext has wrong length"));
    }

    let my_pub = *X25519PublicKey::from(enc_secret).as_bytes();
    let shared = Zeroizing::new(
        *enc_secret
            .diffie_hellman(&X25519PublicKey::from(eph_pub))
            .as_bytes(),
    );
    let wrap_key = wrap_key_for(&shared, &eph_pub, &my_pub);

    let mut plain = Zeroizing::new(aead_open(&wrap_key, &nonce, &ct, &my_pub)?);
    let mut key = Zeroizing::new([0u8; 32]);
    if plain.len() != 32 {
        return Err(CoreError::AuthFailure);
    }
    key.copy_from_slice(&plain);
    plain.clear();
    Ok(key)
}
