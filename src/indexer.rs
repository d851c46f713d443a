use std::collections::{BTreeMap, HashSet};

use anyhow::{Result, bail};
use serde::Serialize;

/// Which backing table an index covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Movie,
    Person,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchableRecord {
    pub id: i64,
    pub label: String,
}

impl SearchableRecord {
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

pub type LabelMap = BTreeMap<String, Vec<SearchableRecord>>;

pub fn normalize(label: &str) -> String {
    label.to_lowercase()
}

pub fn tokenize(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split_whitespace()
}

/// A record in the fuzzy-match corpus, with its label already split into
/// normalized words.
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub record: SearchableRecord,
    pub words: Vec<String>,
}

impl CorpusEntry {
    fn new(record: SearchableRecord) -> Self {
        let words = tokenize(&normalize(&record.label))
            .map(str::to_string)
            .collect();
        Self { record, words }
    }
}

/// Full-label and token maps for one entity kind.
#[derive(Debug, Clone)]
pub struct Index {
    kind: EntityKind,
    full_labels: LabelMap,
    tokens: LabelMap,
    corpus: Vec<CorpusEntry>,
}

impl Index {
    pub fn build(kind: EntityKind, records: impl IntoIterator<Item = SearchableRecord>) -> Self {
        let mut full_labels = LabelMap::new();
        let mut tokens = LabelMap::new();

        for record in records {
            let normalized = normalize(&record.label);
            for token in tokenize(&normalized) {
                tokens
                    .entry(token.to_string())
                    .or_default()
                    .push(record.clone());
            }
            full_labels.entry(normalized).or_default().push(record);
        }

        Self::assemble(kind, full_labels, tokens)
    }

    /// Reassembles an index from persisted maps, rejecting maps that could not
    /// have come out of [`Index::build`].
    pub fn from_parts(kind: EntityKind, full_labels: LabelMap, tokens: LabelMap) -> Result<Self> {
        let token_entries: HashSet<(&str, i64)> = tokens
            .iter()
            .flat_map(|(token, records)| records.iter().map(move |r| (token.as_str(), r.id)))
            .collect();

        for (key, records) in &full_labels {
            for record in records {
                if normalize(&record.label) != *key {
                    bail!(
                        "{:?} record {} is filed under {:?} instead of its normalized label",
                        kind,
                        record.id,
                        key
                    );
                }
                for token in tokenize(key) {
                    if !token_entries.contains(&(token, record.id)) {
                        bail!(
                            "{:?} record {} is missing from token {:?}",
                            kind,
                            record.id,
                            token
                        );
                    }
                }
            }
        }

        Ok(Self::assemble(kind, full_labels, tokens))
    }

    fn assemble(kind: EntityKind, full_labels: LabelMap, tokens: LabelMap) -> Self {
        // flattened token data, first occurrence of each id in key order
        let mut seen = HashSet::new();
        let corpus = tokens
            .values()
            .flatten()
            .filter(|record| seen.insert(record.id))
            .map(|record| CorpusEntry::new(record.clone()))
            .collect();

        Self {
            kind,
            full_labels,
            tokens,
            corpus,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn full_labels(&self) -> &LabelMap {
        &self.full_labels
    }

    pub fn tokens(&self) -> &LabelMap {
        &self.tokens
    }

    pub fn corpus(&self) -> &[CorpusEntry] {
        &self.corpus
    }

    pub fn record_count(&self) -> usize {
        self.full_labels.values().map(Vec::len).sum()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// Movie and person indexes built from the same point-in-time read.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    pub movies: Index,
    pub people: Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub movies: usize,
    pub people: usize,
    pub movie_tokens: usize,
    pub person_tokens: usize,
}

impl SearchIndex {
    pub fn build(movies: Vec<SearchableRecord>, people: Vec<SearchableRecord>) -> Self {
        Self {
            movies: Index::build(EntityKind::Movie, movies),
            people: Index::build(EntityKind::Person, people),
        }
    }

    pub fn index(&self, kind: EntityKind) -> &Index {
        match kind {
            EntityKind::Movie => &self.movies,
            EntityKind::Person => &self.people,
        }
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            movies: self.movies.record_count(),
            people: self.people.record_count(),
            movie_tokens: self.movies.token_count(),
            person_tokens: self.people.token_count(),
        }
    }
}
