use sha2::{Digest, Sha256};

/// Compute SHA256 hash of input bytes
pub fn sha256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// SHA-256 over the concatenation of `parts`, without an intermediate buffer.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Lowercase hex SHA-256, used for store keys derived from secrets.
pub fn sha256_hex(input: &[u8]) -> String {
    hex::encode(sha256(input))
}

/// Compare two byte strings without an early exit.
///
/// Every byte pair is XOR-accumulated, so the running time depends only on
/// the length. Lengths are not secret; a mismatch returns `false` up front.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    std::hint::black_box(diff) == 0
}
