//! Binary codes for the coarse search stage.
//!
//! One sign bit per dimension; Hamming distance between codes approximates the
//! angle between the full-precision vectors.

use bitvec::prelude::*;

/// Packs the sign of each component (`> 0.0` → 1), least significant bit first.
pub fn quantize_to_binary(vector: &[f32]) -> Vec<u8> {
    let mut bits = BitVec::<u8, Lsb0>::with_capacity(vector.len());
    for &value in vector {
        bits.push(value > 0.0);
    }
    bits.into_vec()
}

/// Number of differing bits. Codes of different length are maximally distant.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    if a.len() != b.len() {
        return u32::MAX;
    }

    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x ^ y).count_ones())
        .sum()
}

/// Row positions of the `budget` codes nearest to `query`, ties broken by position.
///
/// `codes` is a packed row-major table of `code_len`-byte codes.
pub fn nearest_codes(codes: &[u8], code_len: usize, query: &[u8], budget: usize) -> Vec<usize> {
    if code_len == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(u32, usize)> = codes
        .chunks_exact(code_len)
        .enumerate()
        .map(|(pos, code)| (hamming_distance(code, query), pos))
        .collect();

    if budget < scored.len() {
        scored.select_nth_unstable(budget);
        scored.truncate(budget);
    }
    scored.sort_unstable();
    scored.into_iter().map(|(_, pos)| pos).collect()
}
