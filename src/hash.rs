//! Content hashing.
//!
//! SHA-256, lowercase hex. The aggregate hash summarizes the whole catalog:
//! it is a digest over the sorted `(id, source_hash)` pairs, so it changes
//! iff any entry's presence or body content changes.

use sha2::{Digest, Sha256};

/// Hex digest of a text body.
pub fn digest_text(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex(&hasher.finalize())
}

/// Aggregate hash over `(id, source_hash)` pairs.
///
/// Pairs are sorted by id before hashing so the result is independent of
/// enumeration order. Fields are length-delimited to avoid ambiguity between
/// adjacent values.
pub fn aggregate_hash<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut sorted: Vec<(&str, &str)> = pairs.into_iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    for (id, hash) in sorted {
        hasher.update((id.len() as u64).to_be_bytes());
        hasher.update(id.as_bytes());
        hasher.update((hash.len() as u64).to_be_bytes());
        hasher.update(hash.as_bytes());
    }
    hex(&hasher.finalize())
}

/// Hex digest of an arbitrary serialized projection (governance hash input).
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex(&hasher.finalize())
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        // Writing to a String cannot fail.
        let _ = write!(out, "{:02x}", b);
    }
    out
}
