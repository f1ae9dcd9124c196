pub mod converter;
pub mod error;
pub mod index;
pub mod search;
pub mod tokenizer;

use serde::{Deserialize, Serialize};

pub use error::{ConfigError, IndexError};
pub use index::{BuildStats, FrequencyDictionary, IndexOptions, InvertedIndex, Snapshot, WordStats};
pub use search::SearchServer;

pub type DocId = u32;

/// Number of occurrences of one token in one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    pub doc_id: DocId,
    pub count: u32,
}

/// A search hit: document id plus its score relative to the best hit of the query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RelativeIndex {
    pub doc_id: DocId,
    pub rank: f32,
}

/// Ranks closer than this are treated as equal.
///
/// With integer scores, distinct ranks can fall within this distance once the best score of a
/// query reaches one million. Past that point the ranked order is no longer guaranteed to
/// be sorted by rank.
pub const RANK_EPSILON: f32 = 1e-6;

impl PartialEq for RelativeIndex {
    fn eq(&self, other: &Self) -> bool {
        self.doc_id == other.doc_id && (self.rank - other.rank).abs() < RANK_EPSILON
    }
}
