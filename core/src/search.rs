use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::index::{InvertedIndex, Snapshot};
use crate::tokenizer::split;
use crate::{DocId, RelativeIndex, WordEntry, RANK_EPSILON};

/// Answers queries against an [`InvertedIndex`].
#[derive(Clone)]
pub struct SearchServer {
    index: Arc<InvertedIndex>,
}

impl SearchServer {
    pub fn new(index: Arc<InvertedIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<InvertedIndex> {
        &self.index
    }

    /// One ranked result list per query, in input order.
    ///
    /// The whole batch reads from a single published snapshot.
    pub fn search<Q: AsRef<str>>(&self, queries: &[Q]) -> Vec<Vec<RelativeIndex>> {
        let snapshot = self.index.snapshot();
        queries.iter().map(|q| resolve(&snapshot, q.as_ref())).collect()
    }

    pub fn resolve(&self, query: &str) -> Vec<RelativeIndex> {
        resolve(&self.index.snapshot(), query)
    }
}

/// Rank the documents matching every query word that occurs somewhere in the corpus.
///
/// Words are visited rarest first. Scores are summed occurrence counts, normalized by the
/// best score, and ties (within [`RANK_EPSILON`]) are ordered by ascending doc id.
pub fn resolve(snapshot: &Snapshot, query: &str) -> Vec<RelativeIndex> {
    let unique: BTreeSet<String> = split(query).into_iter().collect();
    if unique.is_empty() {
        return Vec::new();
    }

    let dictionary = snapshot.dictionary();
    let mut words: Vec<&[WordEntry]> = unique.iter().map(|w| dictionary.get(w)).collect();
    words.sort_by_key(|entries| entries.len());

    let (rarest, rest) = match words.split_first() {
        Some((rarest, rest)) if !rarest.is_empty() => (rarest, rest),
        _ => return Vec::new(),
    };

    let mut scores: HashMap<DocId, u64> = rarest.iter().map(|e| (e.doc_id, u64::from(e.count))).collect();

    for entries in rest {
        if entries.is_empty() {
            continue;
        }
        scores = entries
            .iter()
            .filter_map(|e| scores.get(&e.doc_id).map(|score| (e.doc_id, score + u64::from(e.count))))
            .collect();
        if scores.is_empty() {
            return Vec::new();
        }
    }

    let max = scores.values().copied().max().unwrap_or(0);
    if max == 0 {
        return Vec::new();
    }

    let mut result: Vec<RelativeIndex> = scores
        .into_iter()
        .map(|(doc_id, score)| RelativeIndex { doc_id, rank: score as f32 / max as f32 })
        .collect();
    result.sort_by(compare_ranked);

    tracing::debug!(query, hits = result.len(), "resolved query");
    result
}

/// Descending rank, ascending doc id for ranks within [`RANK_EPSILON`].
///
/// Not transitive when neighbouring ranks are closer than the epsilon (best scores of 1e6 and above),
/// in which case `sort_by` yields an unspecified order of those hits.
fn compare_ranked(a: &RelativeIndex, b: &RelativeIndex) -> Ordering {
    if (a.rank - b.rank).abs() < RANK_EPSILON {
        a.doc_id.cmp(&b.doc_id)
    } else {
        b.rank.partial_cmp(&a.rank).unwrap_or(Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(docs: &[&str]) -> SearchServer {
        let index = InvertedIndex::new().unwrap();
        index.rebuild(docs).unwrap();
        SearchServer::new(Arc::new(index))
    }

    #[test]
    fn single_word_by_count() {
        let s = server(&["milk water", "milk milk milk", "water"]);
        let r = s.resolve("milk");
        assert_eq!(r, vec![RelativeIndex { doc_id: 1, rank: 1.0 }, RelativeIndex { doc_id: 0, rank: 1.0 / 3.0 }]);
    }

    #[test]
    fn scores_sum_over_words() {
        let s = server(&["a b b", "a a b", "a c"]);
        let r = s.resolve("a b");
        // doc 0: 1 + 2, doc 1: 2 + 1, doc 2 lacks b
        assert_eq!(r, vec![RelativeIndex { doc_id: 0, rank: 1.0 }, RelativeIndex { doc_id: 1, rank: 1.0 }]);
    }

    #[test]
    fn duplicate_query_words_count_once() {
        let s = server(&["x y", "x x y"]);
        assert_eq!(s.resolve("x x x"), s.resolve("x"));
    }

    #[test]
    fn empty_and_whitespace_queries() {
        let s = server(&["anything"]);
        assert!(s.resolve("").is_empty());
        assert!(s.resolve("   \t ").is_empty());
    }

    #[test]
    fn disjoint_words_short_circuit() {
        let s = server(&["cat", "dog"]);
        assert!(s.resolve("cat dog").is_empty());
    }

    #[test]
    fn word_absent_everywhere_is_rarest_and_empties_result() {
        let s = server(&["london capital", "paris capital"]);
        assert!(s.resolve("capital nowhere").is_empty());
    }

    #[test]
    fn ties_break_by_doc_id() {
        let s = server(&["w", "w", "w w", "w"]);
        let ids: Vec<DocId> = s.resolve("w").iter().map(|r| r.doc_id).collect();
        assert_eq!(ids, vec![2, 0, 1, 3]);
    }

    #[test]
    fn close_ranks_sort_by_rank_below_epsilon_limit() {
        let big = vec!["w"; 100_000].join(" ");
        let smaller = vec!["w"; 99_999].join(" ");
        let s = server(&[smaller.as_str(), big.as_str()]);
        let r = s.resolve("w");
        assert_eq!(r[0].doc_id, 1);
        assert_eq!(r[0].rank, 1.0);
        assert!(r[0].rank - r[1].rank >= RANK_EPSILON);
    }

    #[test]
    fn batch_keeps_input_order() {
        let s = server(&["alpha", "beta"]);
        let out = s.search(&["beta", "gamma", "alpha"]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], vec![RelativeIndex { doc_id: 1, rank: 1.0 }]);
        assert!(out[1].is_empty());
        assert_eq!(out[2], vec![RelativeIndex { doc_id: 0, rank: 1.0 }]);
    }
}
