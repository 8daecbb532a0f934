//! HKDF-SHA256 derivations.

use hkdf::Hkdf;
use sha2::Sha256;

/// HKDF-SHA256(salt, ikm) expanded with `info` into `out`.
pub fn hkdf_sha256(ikm: &[u8], salt: &[u8], info: &[u8], out: &mut [u8]) {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    hk.expand(info, out).unwrap(); // output <= 255 * 32 bytes, infallible here
}

/// Per-transaction group key: GK = HKDF(ikm = content key, salt = tx id,
/// info = group id). Binds the key to both the transaction and the group so
/// it is useless across groups and across transactions.
pub fn derive_group_key(content_key: &[u8; 32], tx_id: &[u8; 16], group_id: &str) -> [u8; 32] {
    let mut gk = [0u8; 32];
    hkdf_sha256(content_key, tx_id, group_id.as_bytes(), &mut gk);
    gk
}
