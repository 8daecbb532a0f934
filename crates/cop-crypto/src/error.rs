//! Error types for the protection pipelines.
//!
//! Messages never carry key material or plaintext. `AuthFailure` and
//! `SignatureInvalid` deliberately share the same user-facing text so
//! untrusted callers cannot tell the two verification classes apart.

use thiserror::Error;

use crate::keystore::KeyStoreError;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Envelope or record fails structural or canonicalization checks.
    #[error("malformed input: {0}")]
    Malformed(&'static str),

    /// Seller, buyer, or sharer signature did not verify.
    #[error("verification failed")]
    SignatureInvalid,

    /// AEAD authentication failed (tamper, wrong key, wrong aad).
    #[error("verification failed")]
    AuthFailure,

    /// No wrapped key matched the caller.
    #[error("no wrapped key for caller")]
    NotARecipient,

    /// Directory lookup missed a party name.
    #[error("unknown party: {0}")]
    UnknownParty(String),

    /// Group resolver lookup missed a group id.
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// I/O or integrity failure loading a secret.
    #[error("keystore failure: {0}")]
    KeyStore(#[from] KeyStoreError),

    /// CSPRNG unavailable.
    #[error("randomness unavailable")]
    RandomnessFailure,

    /// Buyer-sign invoked with a name that does not match the envelope.
    #[error("buyer name does not match envelope")]
    WrongBuyer,
}
