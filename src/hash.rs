//! Content Hasher
//!
//! Maps snippet bytes to a short class-safe identifier: XXH64 with a fixed
//! seed, rendered in base-52 so the result is always a valid CSS class token.

use xxhash_rust::xxh64::xxh64;

/// Letters only, lowercase first. Index 0 is used for the zero hash.
pub const BASE52: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// The hash is never seeded per process; identifiers must be stable across runs.
const HASH_SEED: u64 = 0;

/// Hash raw bytes into a base-52 identifier.
pub fn hash_bytes(data: &[u8]) -> String {
    encode_base52(xxh64(data, HASH_SEED))
}

/// Hash a snippet. No whitespace normalization happens here: `"a: b"` and
/// `"a:b"` are different snippets.
pub fn hash_str(data: &str) -> String {
    hash_bytes(data.as_bytes())
}

pub fn encode_base52(mut value: u64) -> String {
    if value == 0 {
        return (BASE52[0] as char).to_string();
    }

    // u64::MAX needs 12 base-52 digits
    let mut digits = Vec::with_capacity(12);
    while value > 0 {
        digits.push(BASE52[(value % 52) as usize]);
        value /= 52;
    }
    digits.reverse();

    // Every byte comes from BASE52, which is ASCII.
    digits.into_iter().map(char::from).collect()
}
