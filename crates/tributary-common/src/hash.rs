//! Content hashing utilities
//!
//! Change detection compares 256-bit digests of entity content across runs,
//! so the hash here must be stable: same input bytes, same hex digest,
//! on every platform and in every release.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hex-encoded SHA-256 over a sequence of fields.
///
/// Fields are length-prefixed before hashing so that moving bytes across a
/// field boundary changes the digest (`["ab", "c"]` vs `["a", "bc"]`).
pub fn sha256_hex_fields<I, B>(fields: I) -> String
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    for field in fields {
        let bytes = field.as_ref();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha256_hex_is_stable() {
        assert_eq!(sha256_hex(b"same input"), sha256_hex(b"same input"));
    }

    #[test]
    fn test_field_boundaries_matter() {
        assert_ne!(
            sha256_hex_fields(["ab", "c"]),
            sha256_hex_fields(["a", "bc"])
        );
    }

    #[test]
    fn test_fields_differ_from_concatenation() {
        assert_ne!(sha256_hex_fields(["abc"]), sha256_hex(b"abc"));
    }
}
