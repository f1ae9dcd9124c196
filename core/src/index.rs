use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::IndexError;
use crate::tokenizer::{fold, split};
use crate::{DocId, WordEntry};

/// token -> one entry per document containing it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrequencyDictionary {
    words: HashMap<String, Vec<WordEntry>>,
}

impl FrequencyDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries for an already folded token.
    pub fn get(&self, token: &str) -> &[WordEntry] {
        self.words.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entries for `token` after case folding. Absent tokens yield an empty list.
    pub fn lookup(&self, token: &str) -> Vec<WordEntry> {
        self.get(&fold(token)).to_vec()
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn merge_document(&mut self, doc_id: DocId, counts: HashMap<String, u32>) {
        for (token, count) in counts {
            let entries = self.words.entry(token).or_default();
            match entries.iter_mut().find(|e| e.doc_id == doc_id) {
                Some(entry) => entry.count = count,
                None => entries.push(WordEntry { doc_id, count }),
            }
        }
    }

    // Merge order depends on worker scheduling; sorting makes equal inputs compare equal.
    fn finish(&mut self) {
        for entries in self.words.values_mut() {
            entries.sort_unstable_by_key(|e| e.doc_id);
        }
    }
}

/// Aggregate counts for one token across the whole corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WordStats {
    pub documents: usize,
    pub occurrences: u64,
}

impl WordStats {
    pub fn from_entries(entries: &[WordEntry]) -> Self {
        Self {
            documents: entries.len(),
            occurrences: entries.iter().map(|e| u64::from(e.count)).sum(),
        }
    }
}

/// A fully built dictionary together with the documents it was built from.
#[derive(Debug, Default)]
pub struct Snapshot {
    dictionary: FrequencyDictionary,
    documents: Vec<String>,
}

impl Snapshot {
    pub fn dictionary(&self) -> &FrequencyDictionary {
        &self.dictionary
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn document(&self, doc_id: DocId) -> Option<&str> {
        self.documents.get(doc_id as usize).map(String::as_str)
    }

    pub fn lookup(&self, token: &str) -> Vec<WordEntry> {
        self.dictionary.lookup(token)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Size of the indexing pool. `None` uses one thread per CPU.
    pub worker_threads: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct BuildStats {
    pub documents: usize,
    pub tokens: usize,
    pub elapsed: Duration,
}

/// In-memory index over the documents of the most recent successful rebuild.
///
/// Rebuilds count words on a bounded worker pool, merge per-document results into a
/// fresh dictionary and then publish it with a single pointer swap. Readers holding a
/// [`Snapshot`] keep seeing the old data until they drop it.
pub struct InvertedIndex {
    current: RwLock<Arc<Snapshot>>,
    build: Mutex<()>,
    pool: ThreadPool,
}

impl InvertedIndex {
    pub fn new() -> Result<Self, IndexError> {
        Self::with_options(IndexOptions::default())
    }

    pub fn with_options(options: IndexOptions) -> Result<Self, IndexError> {
        let threads = options.worker_threads.unwrap_or_else(num_cpus::get);
        if threads == 0 {
            return Err(IndexError::InvalidOptions("worker_threads must be at least 1".into()));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("docsearch-index-{i}"))
            .build()?;
        Ok(Self { current: RwLock::new(Arc::new(Snapshot::default())), build: Mutex::new(()), pool })
    }

    /// Replace the whole index with `documents`; doc ids are positions in the slice.
    ///
    /// On error nothing is published and the previous index stays visible.
    pub fn rebuild<D>(&self, documents: &[D]) -> Result<BuildStats, IndexError>
    where
        D: AsRef<[u8]> + Sync,
    {
        if documents.len() > DocId::MAX as usize {
            return Err(IndexError::TooManyDocuments(documents.len()));
        }
        let _building = self.build.lock();
        let start = Instant::now();
        tracing::info!(documents = documents.len(), threads = self.pool.current_num_threads(), "rebuilding index");

        let dictionary = Mutex::new(FrequencyDictionary::new());
        let texts = self.pool.install(|| {
            documents
                .par_iter()
                .enumerate()
                .map(|(pos, raw)| -> Result<String, IndexError> {
                    let doc_id = pos as DocId;
                    let text = std::str::from_utf8(raw.as_ref())
                        .map_err(|source| IndexError::InvalidEncoding { doc_id, source })?;
                    let counts = count_words(text);
                    dictionary.lock().merge_document(doc_id, counts);
                    Ok(text.to_owned())
                })
                .collect::<Result<Vec<String>, IndexError>>()
        });
        let texts = match texts {
            Ok(texts) => texts,
            Err(err) => {
                tracing::warn!(error = %err, "rebuild aborted, keeping previous index");
                return Err(err);
            }
        };

        let mut dictionary = dictionary.into_inner();
        dictionary.finish();
        let stats = BuildStats { documents: texts.len(), tokens: dictionary.len(), elapsed: start.elapsed() };
        *self.current.write() = Arc::new(Snapshot { dictionary, documents: texts });

        tracing::info!(documents = stats.documents, tokens = stats.tokens, took_ms = (stats.elapsed.as_millis() as u64), "index published");
        Ok(stats)
    }

    /// Consistent read view of the last published build.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    pub fn lookup(&self, token: &str) -> Vec<WordEntry> {
        self.snapshot().lookup(token)
    }

    pub fn word_stats(&self, token: &str) -> WordStats {
        let snapshot = self.snapshot();
        WordStats::from_entries(snapshot.dictionary().get(&fold(token)))
    }

    pub fn document(&self, doc_id: DocId) -> Option<String> {
        self.snapshot().document(doc_id).map(str::to_owned)
    }

    pub fn document_count(&self) -> usize {
        self.snapshot().documents().len()
    }

    pub fn token_count(&self) -> usize {
        self.snapshot().dictionary().len()
    }
}

fn count_words(text: &str) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for word in split(text) {
        *counts.entry(word).or_insert(0) += 1;
    }
    counts
}
