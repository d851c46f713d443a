use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result, anyhow};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use rusqlite::{Connection, OpenFlags};
use tokio::task;
use tracing::debug;

use crate::indexer::{EntityKind, SearchableRecord};

/// Read-only access to the `(id, label)` pairs an index is built from.
pub trait RecordSource: Send + Sync {
    fn fetch(&self, kind: EntityKind) -> BoxFuture<'_, Result<Vec<SearchableRecord>>>;
}

/// Reads movies and people straight out of the application's SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteRecordSource {
    path: PathBuf,
}

impl SqliteRecordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn source_query(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Movie => "SELECT movie_id, title FROM movie",
        EntityKind::Person => "SELECT person_id, person_name FROM person",
    }
}

impl RecordSource for SqliteRecordSource {
    fn fetch(&self, kind: EntityKind) -> BoxFuture<'_, Result<Vec<SearchableRecord>>> {
        let path = self.path.clone();
        async move {
            task::spawn_blocking(move || read_records(&path, kind))
                .await
                .context("joining record fetch task")?
        }
        .boxed()
    }
}

fn read_records(path: &Path, kind: EntityKind) -> Result<Vec<SearchableRecord>> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("opening database {}", path.display()))?;

    let sql = source_query(kind);
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("preparing {:?} record query", kind))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
        })
        .with_context(|| format!("running {}", sql))?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        let (id, label) = row.with_context(|| format!("reading {:?} row", kind))?;
        match label {
            Some(label) => records.push(SearchableRecord { id, label }),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(?kind, skipped, "skipped rows without a label");
    }
    debug!(?kind, count = records.len(), "fetched records");
    Ok(records)
}

/// Record lists held in memory. Replacing a list only affects indexes built
/// afterwards.
#[derive(Debug, Default)]
pub struct MemoryRecordSource {
    movies: RwLock<Vec<SearchableRecord>>,
    people: RwLock<Vec<SearchableRecord>>,
}

impl MemoryRecordSource {
    pub fn new(movies: Vec<SearchableRecord>, people: Vec<SearchableRecord>) -> Self {
        Self {
            movies: RwLock::new(movies),
            people: RwLock::new(people),
        }
    }

    fn list(&self, kind: EntityKind) -> &RwLock<Vec<SearchableRecord>> {
        match kind {
            EntityKind::Movie => &self.movies,
            EntityKind::Person => &self.people,
        }
    }

    pub fn replace(&self, kind: EntityKind, records: Vec<SearchableRecord>) -> Result<()> {
        let mut guard = self
            .list(kind)
            .write()
            .map_err(|_| anyhow!("{:?} record list lock poisoned", kind))?;
        *guard = records;
        Ok(())
    }
}

impl RecordSource for MemoryRecordSource {
    fn fetch(&self, kind: EntityKind) -> BoxFuture<'_, Result<Vec<SearchableRecord>>> {
        let records = self
            .list(kind)
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| anyhow!("{:?} record list lock poisoned", kind));
        async move { records }.boxed()
    }
}
