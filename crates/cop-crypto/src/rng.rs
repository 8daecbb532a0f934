//! CSPRNG access with an explicit failure kind.
//!
//! Nonces, transaction ids, and content keys are all fresh random values;
//! nothing in this crate derives a nonce from content or key material.

use crate::error::CoreError;

/// Fill a fixed-size array from the operating system CSPRNG.
pub fn random_bytes<const N: usize>() -> Result<[u8; N], CoreError> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf).map_err(|_| CoreError::RandomnessFailure)?;
    Ok(buf)
}
