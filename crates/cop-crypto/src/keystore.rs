//! On-disk persistence of a party's identity key pair.
//!
//! One JSON record per party, named by a digest of the party name. The
//! record self-authenticates with an HMAC-SHA256 tag keyed by a digest of
//! the secret seeds over the party name and public keys, so any bit flip in
//! the stored record is detected on load. `generate` is write-once.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use crate::canonical::{b64, b64_array};
use crate::directory::PartyPublics;
use crate::hash::sha256;
use crate::identity::IdentityKeyPair;

type HmacSha256 = Hmac<Sha256>;

const RECORD_DOMAIN: &[u8] = b"cop/keystore/v1";

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("identity not found: {0}")]
    NotFound(String),
    #[error("identity already exists: {0}")]
    AlreadyExists(String),
    #[error("keystore io failure: {0}")]
    Io(String),
    #[error("keystore record failed integrity check")]
    Integrity,
    #[error("keystore record malformed")]
    Malformed,
}

impl From<std::io::Error> for KeyStoreError {
    fn from(e: std::io::Error) -> Self {
        KeyStoreError::Io(e.to_string())
    }
}

/// Stored form of one identity. All binary fields base64url without padding.
#[derive(Serialize, Deserialize)]
struct KeyRecord {
    name: String,
    sign_seed: String,
    enc_seed: String,
    sign_pub: String,
    enc_pub: String,
    tag: String,
}

/// Directory-backed key store, one record file per party.
pub struct FileKeyStore {
    root: PathBuf,
}

impl FileKeyStore {
    /// Open (creating if needed) a key store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, KeyStoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, name: &str) -> PathBuf {
        // File name is a digest so arbitrary party names stay path-safe.
        let digest = sha256(name.as_bytes());
        self.root.join(format!("{}.json", hex::encode(&digest[..16])))
    }

    /// Create a fresh identity for `name`. Fails if one already exists.
    pub fn generate(&self, name: &str) -> Result<IdentityKeyPair, KeyStoreError> {
        let path = self.record_path(name);
        if path.exists() {
            return Err(KeyStoreError::AlreadyExists(name.to_string()));
        }

        let identity = IdentityKeyPair::generate();
        let record = Self::build_record(name, &identity);
        let json = serde_json::to_vec_pretty(&record).map_err(|_| KeyStoreError::Malformed)?;

        // create_new keeps generate write-once even under a concurrent caller.
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                use std::io::Write;
                file.write_all(&json)?;
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(KeyStoreError::AlreadyExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        debug!(party = name, "generated identity key pair");
        Ok(identity)
    }

    /// Load the identity for `name`, verifying record integrity.
    pub fn load(&self, name: &str) -> Result<IdentityKeyPair, KeyStoreError> {
        let path = self.record_path(name);
        let json = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(KeyStoreError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let record: KeyRecord =
            serde_json::from_slice(&json).map_err(|_| KeyStoreError::Malformed)?;
        if record.name != name {
            return Err(KeyStoreError::Integrity);
        }

        let sign_seed: Zeroizing<[u8; 32]> =
            Zeroizing::new(b64_array(&record.sign_seed).map_err(|_| KeyStoreError::Malformed)?);
        let enc_seed: Zeroizing<[u8; 32]> =
            Zeroizing::new(b64_array(&record.enc_seed).map_err(|_| KeyStoreError::Malformed)?);

        let tag: [u8; 32] = b64_array(&record.tag).map_err(|_| KeyStoreError::Malformed)?;
        record_tag(&record.name, &sign_seed, &enc_seed)
            .verify_slice(&tag)
            .map_err(|_| KeyStoreError::Integrity)?;

        let identity = IdentityKeyPair::from_seeds(&sign_seed, &enc_seed);

        // The tag covers name and seeds; the stored publics must re-derive.
        let sign_pub: [u8; 32] =
            b64_array(&record.sign_pub).map_err(|_| KeyStoreError::Malformed)?;
        let enc_pub: [u8; 32] = b64_array(&record.enc_pub).map_err(|_| KeyStoreError::Malformed)?;
        if identity.signing_public() != sign_pub || identity.enc_public() != enc_pub {
            return Err(KeyStoreError::Integrity);
        }

        Ok(identity)
    }

    /// Load only the public half of an identity.
    pub fn publics(&self, name: &str) -> Result<PartyPublics, KeyStoreError> {
        let identity = self.load(name)?;
        Ok(PartyPublics {
            signing: identity.signing_public(),
            enc: identity.enc_public(),
        })
    }

    pub fn exists(&self, name: &str) -> bool {
        self.record_path(name).exists()
    }

    fn build_record(name: &str, identity: &IdentityKeyPair) -> KeyRecord {
        let sign_seed = Zeroizing::new(identity.sign_seed());
        let enc_seed = Zeroizing::new(identity.enc_seed());
        let mac = record_tag(name, &sign_seed, &enc_seed);
        let tag = mac.finalize().into_bytes();
        KeyRecord {
            name: name.to_string(),
            sign_seed: b64(sign_seed.as_ref()),
            enc_seed: b64(enc_seed.as_ref()),
            sign_pub: b64(&identity.signing_public()),
            enc_pub: b64(&identity.enc_public()),
            tag: b64(&tag),
        }
    }
}

/// Integrity tag over the record, keyed by a digest of the secret seeds.
fn record_tag(name: &str, sign_seed: &[u8; 32], enc_seed: &[u8; 32]) -> HmacSha256 {
    let mut ikm = Zeroizing::new(Vec::with_capacity(RECORD_DOMAIN.len() + 64));
    ikm.extend_from_slice(RECORD_DOMAIN);
    ikm.extend_from_slice(sign_seed);
    ikm.extend_from_slice(enc_seed);
    let key = Zeroizing::new(sha256(&ikm));

    let mut mac = HmacSha256::new_from_slice(key.as_ref()).expect("hmac accepts any key length");
    mac.update(name.as_bytes());
    mac.update(sign_seed);
    mac.update(enc_seed);
    mac
}
