//! Public key directory: party name to published public keys.
//!
//! Read-only from the core's viewpoint; real deployments back this with the
//! directory collaborator. The in-memory implementation serves tests and
//! local flows.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// A party's published public keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyPublics {
    /// Ed25519 signing public key
    pub signing: [u8; 32],
    /// X25519 encryption public key
    pub enc: [u8; 32],
}

/// Snapshot-returning read interface over published party keys.
pub trait PublicKeyDirectory: Send + Sync {
    fn publics(&self, name: &str) -> Option<PartyPublics>;
}

/// Thread-safe in-memory directory.
#[derive(Default)]
pub struct InMemoryDirectory {
    entries: RwLock<HashMap<String, PartyPublics>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish (or replace) a party's public keys.
    pub fn publish(&self, name: &str, publics: PartyPublics) {
        self.entries
            .write()
            .expect("directory lock poisoned")
            .insert(name.to_string(), publics);
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .expect("directory lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl PublicKeyDirectory for InMemoryDirectory {
    fn publics(&self, name: &str) -> Option<PartyPublics> {
        self.entries
            .read()
            .expect("directory lock poisoned")
            .get(name)
            .copied()
    }
}
