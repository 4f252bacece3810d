//! BLAKE3 content fingerprints.
//!
//! Embeddings are reused until the text they were derived from changes, so every
//! cache and index tag in the crate is one of these hashes.

use blake3::Hasher;

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Used as a content fingerprint for embedding reuse. A collision only means a
/// stale vector is reused for one run; it never corrupts persisted matches.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    truncate(hash.as_bytes())
}

/// Fingerprint of a single text (profile corpus, job text).
#[inline]
pub fn hash_text(text: &str) -> u64 {
    hash_to_u64(text.as_bytes())
}

/// Full 32-byte checksum over an index payload (ids, tags, vector bits).
pub fn hash_index_payload(dim: u32, ids: &[u64], tags: &[u64], vectors: &[f32]) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(&dim.to_le_bytes());
    hasher.update(&(ids.len() as u64).to_le_bytes());
    for id in ids {
        hasher.update(&id.to_le_bytes());
    }
    for tag in tags {
        hasher.update(&tag.to_le_bytes());
    }
    for value in vectors {
        hasher.update(&value.to_bits().to_le_bytes());
    }
    *hasher.finalize().as_bytes()
}

#[inline]
fn truncate(bytes: &[u8; 32]) -> u64 {
    let head: [u8; 8] = bytes[0..8]
        .try_into()
        .expect("BLAKE3 always produces at least 8 bytes");
    u64::from_le_bytes(head)
}
