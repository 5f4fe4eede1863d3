//! The positional inverted index: incremental build and phrase search.

mod tokenize;

pub use tokenize::{tokenize, WordPosition};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::corpus::CorpusProvider;
use crate::pool::WorkerPool;
use crate::task::Task;
use crate::util::CountdownLatch;

type PostingMap = HashMap<u64, Vec<WordPosition>>;
type Table = HashMap<String, PostingMap>;

/// A search hit: a document path and the byte offsets of every phrase
/// match discovered in it, in discovery order (the caller sorts them).
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document_path: String,
    pub match_start_char_offsets: Vec<u64>,
}

/// Maps each lowercased alphanumeric token to its per-document posting
/// lists, protected by a single readers-writer lock.
///
/// Searches hold the shared lock for their entire duration. Ingest tasks
/// take the exclusive lock only to merge their already-tokenized, locally
/// built postings into the shared map — tokenization itself is lock-free.
pub struct InvertedIndex {
    table: Arc<RwLock<Table>>,
    indexed_count: AtomicU64,
    corpus: Arc<dyn CorpusProvider>,
}

impl InvertedIndex {
    pub fn new(corpus: Arc<dyn CorpusProvider>) -> Self {
        Self {
            table: Arc::new(RwLock::new(HashMap::new())),
            indexed_count: AtomicU64::new(0),
            corpus,
        }
    }

    /// Number of documents fully ingested so far.
    pub fn indexed_count(&self) -> u64 {
        self.indexed_count.load(Ordering::SeqCst)
    }

    /// Number of distinct tokens observed so far.
    pub fn vocabulary_size(&self) -> usize {
        self.table.read().len()
    }

    /// Discards all index state.
    pub fn clear(&self) {
        self.table.write().clear();
        self.indexed_count.store(0, Ordering::SeqCst);
    }

    /// `clear()` followed by `build()`.
    pub fn rebuild(&self, pool: &WorkerPool) {
        self.clear();
        self.build(pool);
    }

    /// Lists the corpus, enqueues one ingest task per not-yet-indexed
    /// document onto `pool`, and waits for the whole wave to merge before
    /// advancing `indexed_count`.
    ///
    /// Each document is ingested by exactly one task, so per-`(token,
    /// document_id)` posting lists are built strictly in order and never
    /// interleaved across tasks, even though merges into the shared map
    /// are serialized by a single exclusive lock.
    pub fn build(&self, pool: &WorkerPool) {
        let paths = self.corpus.list_paths();
        let already = self.indexed_count.load(Ordering::SeqCst) as usize;
        if paths.len() <= already {
            return;
        }

        let pending = paths.len() - already;
        let latch = Arc::new(CountdownLatch::new(pending));

        for (document_id, path) in paths.iter().enumerate().skip(already) {
            let document_id = document_id as u64;
            let path = path.clone();
            let corpus = self.corpus.clone();
            let table = self.table.clone();
            let latch = latch.clone();

            pool.add_task(Task::new(move || {
                let content = corpus.read(&path);
                let local = build_local_index(&content, document_id);
                merge_local_index(&table, document_id, local);
                latch.count_down();
            }));
        }

        latch.wait();
        self.indexed_count.store(paths.len() as u64, Ordering::SeqCst);
    }

    /// Tokenizes `query`, finds the rarest query word's posting map, and
    /// scans its positions for consecutive word-offset runs matching the
    /// rest of the phrase. Never fails: absent words, empty queries, or an
    /// empty corpus all yield an empty result set.
    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        let words: Vec<String> = tokenize(query).into_iter().map(|t| t.word).collect();
        if words.is_empty() {
            return Vec::new();
        }

        let table = self.table.read();

        let mut rarest_index = 0usize;
        let mut rarest_docs: Option<&PostingMap> = None;
        let mut min_docs = usize::MAX;

        for (i, word) in words.iter().enumerate() {
            let docs = match table.get(word) {
                Some(docs) => docs,
                None => return Vec::new(),
            };
            if docs.len() < min_docs {
                min_docs = docs.len();
                rarest_docs = Some(docs);
                rarest_index = i;
            }
        }

        let rarest_docs = match rarest_docs {
            Some(docs) => docs,
            None => return Vec::new(),
        };

        let mut document_matches: HashMap<u64, Vec<u64>> = HashMap::new();

        for (&document_id, positions) in rarest_docs.iter() {
            for rare_position in positions.iter() {
                if rare_position.word_offset < rarest_index as u64 {
                    continue;
                }
                let base = rare_position.word_offset - rarest_index as u64;

                let mut phrase_start = if rarest_index == 0 {
                    Some(rare_position.char_offset)
                } else {
                    None
                };
                let mut valid = true;

                for (i, word) in words.iter().enumerate() {
                    if i == rarest_index {
                        continue;
                    }
                    let docs_for_word = table
                        .get(word)
                        .expect("word already confirmed present above");
                    let positions_for_word = match docs_for_word.get(&document_id) {
                        Some(p) => p,
                        None => {
                            valid = false;
                            break;
                        }
                    };

                    let target = base + i as u64;
                    match positions_for_word.binary_search_by_key(&target, |p| p.word_offset) {
                        Ok(idx) => {
                            if i == 0 {
                                phrase_start = Some(positions_for_word[idx].char_offset);
                            }
                        }
                        Err(_) => {
                            valid = false;
                            break;
                        }
                    }
                }

                if valid {
                    if let Some(start) = phrase_start {
                        document_matches.entry(document_id).or_default().push(start);
                    }
                }
            }
        }

        // Release the index lock before resolving document ids to paths:
        // `list_paths` is a collaborator call, not an index operation, and
        // `FsCorpusProvider::list_paths` in particular does a full corpus
        // rescan on every call — holding the read lock through it would
        // block ingest merges for the duration of that scan on every
        // search.
        drop(table);

        let paths = self.corpus.list_paths();
        let mut results: Vec<SearchResult> = document_matches
            .into_iter()
            .filter_map(|(document_id, offsets)| {
                paths.get(document_id as usize).map(|path| SearchResult {
                    document_path: path.to_string_lossy().into_owned(),
                    match_start_char_offsets: offsets,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.match_start_char_offsets
                .len()
                .cmp(&a.match_start_char_offsets.len())
                .then_with(|| a.document_path.cmp(&b.document_path))
        });

        results
    }
}

/// Builds a per-document posting map from raw text, used as the
/// lock-free local step of an ingest task.
fn build_local_index(content: &str, document_id: u64) -> HashMap<String, Vec<WordPosition>> {
    let mut local: HashMap<String, Vec<WordPosition>> = HashMap::new();
    for token in tokenize(content) {
        local.entry(token.word).or_default().push(token.position);
    }
    let _ = document_id;
    local
}

/// Merges one document's locally built postings into the shared table
/// under a single exclusive lock. Positions within `local`'s lists are
/// already sorted by `word_offset` (the tokenizer scans left to right),
/// so no re-sorting is needed at merge time.
fn merge_local_index(
    table: &Arc<RwLock<Table>>,
    document_id: u64,
    local: HashMap<String, Vec<WordPosition>>,
) {
    let mut table = table.write();
    for (word, positions) in local {
        table
            .entry(word)
            .or_default()
            .entry(document_id)
            .or_default()
            .extend(positions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusProvider;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    struct FixedCorpus {
        docs: Vec<(PathBuf, String)>,
    }

    impl FixedCorpus {
        fn new(docs: Vec<(&str, &str)>) -> Self {
            Self {
                docs: docs
                    .into_iter()
                    .map(|(p, c)| (PathBuf::from(p), c.to_string()))
                    .collect(),
            }
        }
    }

    impl CorpusProvider for FixedCorpus {
        fn list_paths(&self) -> Vec<PathBuf> {
            self.docs.iter().map(|(p, _)| p.clone()).collect()
        }

        fn read(&self, path: &Path) -> String {
            self.docs
                .iter()
                .find(|(p, _)| p == path)
                .map(|(_, c)| c.clone())
                .unwrap_or_default()
        }
    }

    /// A corpus that can grow between calls, for additive-refresh tests.
    struct GrowableCorpus {
        docs: Mutex<Vec<(PathBuf, String)>>,
    }

    impl GrowableCorpus {
        fn new(docs: Vec<(&str, &str)>) -> Self {
            Self {
                docs: Mutex::new(
                    docs.into_iter()
                        .map(|(p, c)| (PathBuf::from(p), c.to_string()))
                        .collect(),
                ),
            }
        }

        fn push(&self, path: &str, content: &str) {
            self.docs
                .lock()
                .unwrap()
                .push((PathBuf::from(path), content.to_string()));
        }
    }

    impl CorpusProvider for GrowableCorpus {
        fn list_paths(&self) -> Vec<PathBuf> {
            self.docs.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
        }

        fn read(&self, path: &Path) -> String {
            self.docs
                .lock()
                .unwrap()
                .iter()
                .find(|(p, _)| p == path)
                .map(|(_, c)| c.clone())
                .unwrap_or_default()
        }
    }

    #[test]
    fn search_finds_indexed_document() {
        let _ = pretty_env_logger::try_init();
        let corpus = Arc::new(FixedCorpus::new(vec![("doc_a.txt", "the quick brown fox")]));
        let pool = WorkerPool::new("ingest", 2);
        let index = InvertedIndex::new(corpus);
        index.build(&pool);

        let results = index.search("quick brown");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_path, "doc_a.txt");
        assert_eq!(results[0].match_start_char_offsets, vec![4]);
    }

    #[test]
    fn tokenization_is_case_insensitive() {
        let corpus = Arc::new(FixedCorpus::new(vec![("doc_a.txt", "Hello World")]));
        let pool = WorkerPool::new("ingest", 2);
        let index = InvertedIndex::new(corpus);
        index.build(&pool);

        assert_eq!(index.search("Hello").len(), index.search("hello").len());
        assert_eq!(index.search("hello").len(), 1);
    }

    #[test]
    fn phrase_order_matters() {
        let corpus = Arc::new(FixedCorpus::new(vec![("doc_a.txt", "red fox blue jay")]));
        let pool = WorkerPool::new("ingest", 2);
        let index = InvertedIndex::new(corpus);
        index.build(&pool);

        assert_eq!(index.search("blue jay").len(), 1);
        assert_eq!(index.search("jay blue").len(), 0);
    }

    #[test]
    fn rarest_word_pivot_picks_smaller_posting_set() {
        let corpus = Arc::new(FixedCorpus::new(vec![
            ("doc_a.txt", "a b c"),
            ("doc_b.txt", "c b a"),
        ]));
        let pool = WorkerPool::new("ingest", 2);
        let index = InvertedIndex::new(corpus);
        index.build(&pool);

        let results = index.search("a b");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_path, "doc_a.txt");
    }

    #[test]
    fn repeated_token_yields_multiple_offsets() {
        let corpus = Arc::new(FixedCorpus::new(vec![("doc_a.txt", "foo foo foo")]));
        let pool = WorkerPool::new("ingest", 2);
        let index = InvertedIndex::new(corpus);
        index.build(&pool);

        let results = index.search("foo");
        assert_eq!(results.len(), 1);
        let mut offsets = results[0].match_start_char_offsets.clone();
        offsets.sort();
        assert_eq!(offsets, vec![0, 4, 8]);
    }

    #[test]
    fn missing_word_returns_empty() {
        let corpus = Arc::new(FixedCorpus::new(vec![("doc_a.txt", "hello world")]));
        let pool = WorkerPool::new("ingest", 2);
        let index = InvertedIndex::new(corpus);
        index.build(&pool);

        assert!(index.search("nothingmatcheshere").is_empty());
    }

    #[test]
    fn build_is_idempotent_on_unchanged_corpus() {
        let corpus = Arc::new(FixedCorpus::new(vec![("doc_a.txt", "alpha beta gamma")]));
        let pool = WorkerPool::new("ingest", 2);
        let index = InvertedIndex::new(corpus);

        index.build(&pool);
        let before = index.search("alpha beta");
        index.build(&pool);
        let after = index.search("alpha beta");

        assert_eq!(index.indexed_count(), 1);
        assert_eq!(
            before
                .iter()
                .map(|r| (r.document_path.clone(), r.match_start_char_offsets.clone()))
                .collect::<Vec<_>>(),
            after
                .iter()
                .map(|r| (r.document_path.clone(), r.match_start_char_offsets.clone()))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn append_additivity_matches_full_rebuild() {
        let corpus = Arc::new(GrowableCorpus::new(vec![("doc_a.txt", "alpha beta gamma")]));
        let pool = WorkerPool::new("ingest", 2);

        let incremental = InvertedIndex::new(corpus.clone());
        incremental.build(&pool);
        corpus.push("doc_b.txt", "beta gamma delta");
        incremental.build(&pool);
        let incremental_results = incremental.search("beta gamma");

        let combined = InvertedIndex::new(corpus);
        combined.build(&pool);
        let combined_results = combined.search("beta gamma");

        let normalize = |rs: Vec<SearchResult>| {
            let mut rs: Vec<_> = rs
                .into_iter()
                .map(|r| (r.document_path, {
                    let mut offs = r.match_start_char_offsets;
                    offs.sort();
                    offs
                }))
                .collect();
            rs.sort();
            rs
        };

        assert_eq!(normalize(incremental_results), normalize(combined_results));
    }

    #[test]
    fn clear_resets_index() {
        let corpus = Arc::new(FixedCorpus::new(vec![("doc_a.txt", "hello world")]));
        let pool = WorkerPool::new("ingest", 2);
        let index = InvertedIndex::new(corpus);
        index.build(&pool);
        assert!(index.indexed_count() > 0);

        index.clear();
        assert_eq!(index.indexed_count(), 0);
        assert!(index.search("hello").is_empty());
    }
}
