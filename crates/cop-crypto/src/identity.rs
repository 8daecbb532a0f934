//! Party identity key pairs: Ed25519 signing plus X25519 key agreement.
//!
//! Secret material is zeroized on drop and never leaves this module except
//! through the KeyStore persistence path.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand_core::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CoreError;

/// A party's long-term identity: Ed25519 signing key pair and X25519
/// encryption key pair.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct IdentityKeyPair {
    /// Ed25519 signing private key
    #[zeroize(skip)] // SigningKey implements Zeroize internally
    sign_key: SigningKey,
    /// X25519 encryption private key
    #[zeroize(skip)] // StaticSecret implements Zeroize internally
    enc_key: StaticSecret,
}

impl IdentityKeyPair {
    /// Generate a new random identity using a secure random source.
    pub fn generate() -> Self {
        let sign_key = SigningKey::generate(&mut OsRng);
        let enc_key = StaticSecret::random_from_rng(OsRng);
        Self { sign_key, enc_key }
    }

    /// Rebuild an identity from stored 32-byte seeds.
    pub fn from_seeds(sign_seed: &[u8; 32], enc_seed: &[u8; 32]) -> Self {
        Self {
            sign_key: SigningKey::from_bytes(sign_seed),
            enc_key: StaticSecret::from(*enc_seed),
        }
    }

    /// Ed25519 signing secret seed, for KeyStore persistence only.
    pub(crate) fn sign_seed(&self) -> [u8; 32] {
        self.sign_key.to_bytes()
    }

    /// X25519 encryption secret bytes, for KeyStore persistence only.
    pub(crate) fn enc_seed(&self) -> [u8; 32] {
        self.enc_key.to_bytes()
    }

    /// Ed25519 signing public key bytes.
    pub fn signing_public(&self) -> [u8; 32] {
        self.sign_key.verifying_key().to_bytes()
    }

    /// X25519 encryption public key bytes.
    pub fn enc_public(&self) -> [u8; 32] {
        *X25519PublicKey::from(&self.enc_key).as_bytes()
    }

    /// Sign a message using Ed25519. Returns a 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let signature: Signature = self.sign_key.sign(message);
        signature.to_bytes()
    }

    /// X25519 Diffie-Hellman with a peer public key.
    pub fn diffie_hellman(&self, peer_pub: &[u8; 32]) -> [u8; 32] {
        let peer = X25519PublicKey::from(*peer_pub);
        *self.enc_key.diffie_hellman(&peer).as_bytes()
    }

    /// The X25519 static secret, for key-unwrap operations.
    pub fn enc_secret(&self) -> &StaticSecret {
        &self.enc_key
    }
}

/// Verify an Ed25519 signature.
pub fn verify_signature(
    pub_key: &[u8; 32],
    message: &[u8],
    signature: &[u8; 64],
) -> Result<(), CoreError> {
    let verifying_key =
        VerifyingKey::from_bytes(pub_key).map_err(|_| CoreError::SignatureInvalid)?;
    let sig = Signature::from_bytes(signature);
    verifying_key
        .verify_strict(message, &sig)
        .map_err(|_| CoreError::SignatureInvalid)
}
