//! Canonical serialization helpers.
//!
//! Seller, buyer, and sharer signatures cover serialized bytes, so the wire
//! form must be deterministic: one JSON object per structure, keys in
//! lexicographic order, no insignificant whitespace, binary fields as
//! base64url without padding, integers in decimal. Serialization routes
//! through `serde_json::Value`, whose object representation is a `BTreeMap`
//! and therefore emits keys sorted; parsers re-serialize and byte-compare,
//! rejecting anything that does not round-trip.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;

use crate::error::CoreError;

/// Encode binary data as base64url without padding.
pub fn b64(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode a base64url-without-padding field.
pub fn b64_decode(s: &str) -> Result<Vec<u8>, CoreError> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|_| CoreError::Malformed("invalid base64url field"))
}

/// Decode a base64url field that must hold exactly `N` bytes.
pub fn b64_array<const N: usize>(s: &str) -> Result<[u8; N], CoreError> {
    let bytes = b64_decode(s)?;
    bytes
        .try_into()
        .map_err(|_| CoreError::Malformed("field has wrong length"))
}

/// Serialize a value to its canonical byte form.
pub fn to_canonical_vec<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    let tree = serde_json::to_value(value)
        .map_err(|_| CoreError::Malformed("value does not serialize"))?;
    serde_json::to_vec(&tree).map_err(|_| CoreError::Malformed("value does not serialize"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct OutOfOrder {
        zebra: String,
        alpha: String,
        middle: Vec<u32>,
    }

    #[test]
    fn test_keys_emitted_sorted_regardless_of_declaration_order() {
        let v = OutOfOrder {
            zebra: "z".into(),
            alpha: "a".into(),
            middle: vec![1, 2],
        };
        let bytes = to_canonical_vec(&v).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"alpha":"a","middle":[1,2],"zebra":"z"}"#
        );
    }

    #[test]
    fn test_b64_round_trip() {
        let data = [0u8, 1, 2, 253, 254, 255];
        let s = b64(&data);
        assert!(!s.contains('='));
        assert_eq!(b64_decode(&s).unwrap(), data);
    }

    #[test]
    fn test_b64_array_length_enforced() {
        let s = b64(&[0u8; 12]);
        assert!(b64_array::<12>(&s).is_ok());
        assert!(b64_array::<16>(&s).is_err());
    }

    #[test]
    fn test_b64_rejects_padding() {
        // Standard base64 padding is not part of the canonical form.
        assert!(b64_decode("AAAA==").is_err());
    }
}
