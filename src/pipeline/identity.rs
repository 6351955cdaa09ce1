use sha2::{Digest, Sha256};

/// Hex characters kept from the digest.
const HASH_LEN: usize = 16;

/// Salted, truncated SHA-256 of a platform reporter id. Raw ids never
/// leave the inbound boundary; storage and logs see only this hash.
pub fn hash_reporter_id(salt: &str, reporter_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(reporter_id.trim().as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(HASH_LEN);
    for byte in digest.iter().take(HASH_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}
