//! Job vector index.
//!
//! A flat, file-backed inner-product index. Large indexes are searched in two
//! stages: sign-bit codes shortlist candidates by Hamming distance, then the
//! full-precision vectors rescore them.

pub mod bq;
pub mod error;
pub mod index;
mod snapshot;


pub use bq::{hamming_distance, quantize_to_binary};
pub use error::{VectorIndexError, VectorIndexResult};
pub use index::{
    DEFAULT_EXACT_SEARCH_LIMIT, DEFAULT_RESCORE_MULTIPLIER, IndexConfig, IndexEntry, SearchHit,
    SimilarityIndex, VectorIndex,
};

/// Snapshot file name under the data directory.
pub const DEFAULT_INDEX_FILENAME: &str = "job_index.rkyv";
