use sha2::{Digest, Sha256};

/// sha256_hex hashes the UTF-8 bytes of `raw` and renders the digest as
/// lowercase hex, two digits per byte.
pub fn sha256_hex(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
