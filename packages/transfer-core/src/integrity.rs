//! Per-sub-chunk integrity verification (SHA-256, hex-encoded on the
//! wire to keep control frames plain JSON).

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of `bytes`.
pub fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Check `bytes` against a previously announced hex digest.
pub fn verify(bytes: &[u8], expected_hex: &str) -> bool {
    digest_hex(bytes).eq_ignore_ascii_case(expected_hex)
}
