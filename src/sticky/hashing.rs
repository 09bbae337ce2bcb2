//! Deterministic fingerprints for session tokens.
//!
//! Two independent hash families: SHA-256 for the canonical token, and the
//! standard library's SipHash (`DefaultHasher`) for the legacy weak scheme
//! older deployments wrote. Both render as lowercase hex so tokens stay
//! cookie-safe.

use sha2::{Digest, Sha256};
use std::hash::{DefaultHasher, Hash, Hasher};

/// Canonical token: SHA-256 hex digest of the server name.
pub fn strong_hash(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Legacy weak token: SipHash of the server name.
pub fn weak_hash(name: &str) -> String {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// Legacy "double-hashed" variant: the weak hash applied to its own hex
/// rendering. Produced by a historical bug, still honored on the read
/// side.
pub fn double_weak_hash(name: &str) -> String {
    weak_hash(&weak_hash(name))
}
