//! Phrase, token and fuzzy matching over an [`Index`], merged by priority.
//!
//! A combined search runs three stages and keeps the first occurrence of each
//! id: full-label hits (exact, or within the edit threshold), then exact token
//! hits for each query term, then records with any word close to the whole
//! query. Within a stage the order follows the index's key order.

use std::collections::HashSet;

use crate::distance::within_distance;
use crate::indexer::{
    CorpusEntry, EntityKind, Index, LabelMap, SearchIndex, SearchableRecord, normalize,
};

pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_MAX_EDITS: usize = 2;

pub type MatchResult = Vec<SearchableRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub limit: usize,
    pub max_edits: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            max_edits: DEFAULT_MAX_EDITS,
        }
    }
}

impl SearchOptions {
    pub fn with_limit(self, limit: Option<usize>) -> Self {
        Self {
            limit: limit.unwrap_or(self.limit),
            ..self
        }
    }
}

/// Exact full-label hit if there is one, otherwise every label within
/// `max_edits` of the query.
pub fn phrase_match<'a>(
    query: &str,
    full_labels: &'a LabelMap,
    max_edits: usize,
) -> Vec<&'a SearchableRecord> {
    if let Some(records) = full_labels.get(query) {
        return records.iter().collect();
    }

    full_labels
        .iter()
        .filter(|(label, _)| within_distance(query, label, max_edits))
        .flat_map(|(_, records)| records.iter())
        .collect()
}

pub fn token_match<'a, T: AsRef<str>>(terms: &[T], tokens: &'a LabelMap) -> Vec<&'a SearchableRecord> {
    let mut seen = HashSet::new();
    terms
        .iter()
        .filter_map(|term| tokens.get(term.as_ref()))
        .flatten()
        .filter(|record| seen.insert(record.id))
        .collect()
}

/// Records with at least one label word within `max_edits` of the whole
/// query. Lazy, so a full result can stop the scan early.
pub fn fuzzy_token_match<'a>(
    corpus: &'a [CorpusEntry],
    query: &'a str,
    max_edits: usize,
) -> impl Iterator<Item = &'a SearchableRecord> + 'a {
    let query = normalize(query);
    corpus
        .iter()
        .filter(move |entry| {
            entry
                .words
                .iter()
                .any(|word| within_distance(&query, word, max_edits))
        })
        .map(|entry| &entry.record)
}

struct Ranked<'a> {
    seen: HashSet<i64>,
    records: Vec<&'a SearchableRecord>,
    limit: usize,
}

impl<'a> Ranked<'a> {
    fn new(limit: usize) -> Self {
        Self {
            seen: HashSet::new(),
            records: Vec::with_capacity(limit),
            limit,
        }
    }

    fn is_full(&self) -> bool {
        self.records.len() >= self.limit
    }

    /// Appends unseen records until the limit is reached; returns whether the
    /// ranking is full.
    fn extend(&mut self, records: impl IntoIterator<Item = &'a SearchableRecord>) -> bool {
        for record in records {
            if self.is_full() {
                break;
            }
            if self.seen.insert(record.id) {
                self.records.push(record);
            }
        }
        self.is_full()
    }

    fn finish(self) -> MatchResult {
        self.records.into_iter().cloned().collect()
    }
}

pub fn combined_search(query: &str, index: &Index, options: &SearchOptions) -> MatchResult {
    let query = normalize(query.trim());
    if query.is_empty() || options.limit == 0 {
        return MatchResult::new();
    }

    let mut ranked = Ranked::new(options.limit);

    if ranked.extend(phrase_match(&query, index.full_labels(), options.max_edits)) {
        return ranked.finish();
    }

    let terms: Vec<&str> = query.split_whitespace().collect();
    if ranked.extend(token_match(&terms, index.tokens())) {
        return ranked.finish();
    }

    ranked.extend(fuzzy_token_match(index.corpus(), &query, options.max_edits));
    ranked.finish()
}

impl SearchIndex {
    pub fn search(&self, kind: EntityKind, query: &str, options: &SearchOptions) -> MatchResult {
        combined_search(query, self.index(kind), options)
    }

    pub fn search_movies(&self, query: &str, options: &SearchOptions) -> MatchResult {
        self.search(EntityKind::Movie, query, options)
    }

    pub fn search_people(&self, query: &str, options: &SearchOptions) -> MatchResult {
        self.search(EntityKind::Person, query, options)
    }
}
