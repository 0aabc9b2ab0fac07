//! Content checksums.

use sha2::{Digest, Sha256};

/// SHA-256 of the UTF-8 content, lowercase hex.
pub fn content_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
