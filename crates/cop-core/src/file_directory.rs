//! File-backed public key directory and group table for the CLI.
//!
//! Real deployments reach the directory and group servers over HTTP; these
//! JSON files stand in for them locally. Binary fields are base64url
//! without padding, matching the envelope wire conventions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cop_crypto::canonical::{b64, b64_array};
use cop_crypto::directory::{PartyPublics, PublicKeyDirectory};
use cop_crypto::groups::{GroupInfo, GroupResolver, GroupSnapshot};

#[derive(Debug, Error)]
pub enum DirectoryFileError {
    #[error("directory file io failure: {0}")]
    Io(String),
    #[error("directory file malformed: {0}")]
    Malformed(String),
}

impl From<std::io::Error> for DirectoryFileError {
    fn from(e: std::io::Error) -> Self {
        DirectoryFileError::Io(e.to_string())
    }
}

#[derive(Serialize, Deserialize)]
struct PublicsEntry {
    signing: String,
    enc: String,
}

/// Party-name to public-keys mapping persisted as one JSON document.
pub struct FileDirectory {
    path: PathBuf,
    entries: BTreeMap<String, PartyPublics>,
}

impl FileDirectory {
    /// Load the directory at `path`; a missing file is an empty directory.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, DirectoryFileError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => {
                let raw: BTreeMap<String, PublicsEntry> = serde_json::from_slice(&bytes)
                    .map_err(|e| DirectoryFileError::Malformed(e.to_string()))?;
                let mut entries = BTreeMap::new();
                for (name, entry) in raw {
                    entries.insert(
                        name,
                        PartyPublics {
                            signing: b64_array(&entry.signing).map_err(|_| {
                                DirectoryFileError::Malformed("bad signing key".into())
                            })?,
                            enc: b64_array(&entry.enc).map_err(|_| {
                                DirectoryFileError::Malformed("bad encryption key".into())
                            })?,
                        },
                    );
                }
                entries
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries })
    }

    /// Publish (or replace) a party's keys and persist the document.
    pub fn publish(&mut self, name: &str, publics: PartyPublics) -> Result<(), DirectoryFileError> {
        self.entries.insert(name.to_string(), publics);
        self.save()
    }

    fn save(&self) -> Result<(), DirectoryFileError> {
        let raw: BTreeMap<&String, PublicsEntry> = self
            .entries
            .iter()
            .map(|(name, publics)| {
                (
                    name,
                    PublicsEntry {
                        signing: b64(&publics.signing),
                        enc: b64(&publics.enc),
                    },
                )
            })
            .collect();
        let bytes = serde_json::to_vec_pretty(&raw)
            .map_err(|e| DirectoryFileError::Malformed(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PublicKeyDirectory for FileDirectory {
    fn publics(&self, name: &str) -> Option<PartyPublics> {
        self.entries.get(name).copied()
    }
}

/// Group-id to member-list mapping read from one JSON document.
pub struct FileGroups {
    groups: BTreeMap<String, Vec<String>>,
}

impl FileGroups {
    /// Load the group table at `path`; a missing file means no groups.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DirectoryFileError> {
        let groups = match std::fs::read(path.as_ref()) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| DirectoryFileError::Malformed(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { groups })
    }
}

impl GroupResolver for FileGroups {
    fn snapshot(&self, group_id: &str) -> Option<GroupSnapshot> {
        self.groups.get(group_id).map(|members| GroupSnapshot {
            group_id: group_id.to_string(),
            members: members.clone(),
        })
    }

    fn info(&self, group_id: &str) -> Option<GroupInfo> {
        self.groups.get(group_id).map(|members| GroupInfo {
            group_id: group_id.to_string(),
            member_count: members.len(),
        })
    }
}
