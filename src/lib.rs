pub mod api;
pub mod config;
pub mod distance;
pub mod indexer;
pub mod records;
pub mod search;
pub mod service;
pub mod snapshot;

pub use indexer::{EntityKind, Index, IndexStats, SearchIndex, SearchableRecord};
pub use records::{MemoryRecordSource, RecordSource, SqliteRecordSource};
pub use search::{MatchResult, SearchOptions};
pub use service::{SearchError, SearchService};
