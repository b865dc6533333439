// hasher.rs — SHA-256 digests of build artifacts.
//
// Digests are lowercase hex, 64 characters.

use sha2::{Digest, Sha256};

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
