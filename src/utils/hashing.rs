//! Stable fingerprint for composed configurations

use sha2::{Digest, Sha256};

/// First 16 hex chars of the SHA-256 of the canonical rendering.
///
/// Two runs composed from the same fragments and overrides share a
/// fingerprint, which makes it usable as a run-directory suffix.
pub fn fingerprint(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)[..16].to_string()
}
