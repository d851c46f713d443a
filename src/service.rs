use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task;
use tracing::{info, warn};

use crate::indexer::{EntityKind, IndexStats, SearchIndex};
use crate::records::RecordSource;
use crate::search::{MatchResult, SearchOptions};
use crate::snapshot::{load_snapshot, save_snapshot};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search index is not ready")]
    NotReady,
}

/// Owns the live [`SearchIndex`] and the snapshot it is persisted to.
///
/// A new service has no index. Searches fail with [`SearchError::NotReady`]
/// until [`SearchService::load`], [`SearchService::build`] or
/// [`SearchService::ensure_ready`] installs one. A rebuild swaps the whole
/// index at once; searches already running keep the index they started with.
pub struct SearchService {
    source: Arc<dyn RecordSource>,
    snapshot_path: PathBuf,
    options: SearchOptions,
    current: RwLock<Option<Arc<SearchIndex>>>,
    rebuild_lock: Mutex<()>,
}

impl SearchService {
    pub fn new(
        source: Arc<dyn RecordSource>,
        snapshot_path: impl Into<PathBuf>,
        options: SearchOptions,
    ) -> Self {
        Self {
            source,
            snapshot_path: snapshot_path.into(),
            options,
            current: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub async fn is_ready(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub async fn current(&self) -> Option<Arc<SearchIndex>> {
        self.current.read().await.clone()
    }

    pub async fn stats(&self) -> Option<IndexStats> {
        self.current().await.map(|index| index.stats())
    }

    /// Installs the persisted snapshot. Returns `false` when there is no
    /// usable snapshot; the caller decides whether to build instead.
    ///
    /// Holds the rebuild lock from read to install, so a snapshot read before
    /// a concurrent build finishes can never replace that build's index.
    pub async fn load(&self) -> Result<bool> {
        let _guard = self.rebuild_lock.lock().await;
        self.load_locked().await
    }

    /// Reads every record from the source, builds both indexes, persists the
    /// snapshot and only then makes the new index visible. Concurrent builds
    /// run one after another.
    pub async fn build(&self) -> Result<IndexStats> {
        let _guard = self.rebuild_lock.lock().await;
        self.build_locked().await
    }

    async fn load_locked(&self) -> Result<bool> {
        let Some(index) = load_snapshot(&self.snapshot_path).await? else {
            return Ok(false);
        };
        let stats = index.stats();
        *self.current.write().await = Some(Arc::new(index));
        info!(
            path = %self.snapshot_path.display(),
            movies = stats.movies,
            people = stats.people,
            "loaded search index snapshot"
        );
        Ok(true)
    }

    async fn build_locked(&self) -> Result<IndexStats> {
        let started = Instant::now();

        let (movies, people) = tokio::try_join!(
            self.source.fetch(EntityKind::Movie),
            self.source.fetch(EntityKind::Person),
        )
        .context("fetching records for the search index")?;

        let index = task::spawn_blocking(move || SearchIndex::build(movies, people))
            .await
            .context("joining index build task")?;

        save_snapshot(&self.snapshot_path, &index)
            .await
            .context("saving search index snapshot")?;

        let stats = index.stats();
        *self.current.write().await = Some(Arc::new(index));
        info!(
            movies = stats.movies,
            people = stats.people,
            movie_tokens = stats.movie_tokens,
            person_tokens = stats.person_tokens,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built search index"
        );
        Ok(stats)
    }

    /// Forces a fresh build and snapshot write, replacing whatever is loaded.
    pub async fn rebuild_index(&self) -> Result<IndexStats> {
        info!("rebuilding search index");
        self.build().await.inspect_err(|err| {
            warn!(error = %format!("{:#}", err), "search index rebuild failed");
        })
    }

    /// Loads the snapshot, or builds when there is none. Callers racing on a
    /// cold service share one load or build.
    pub async fn ensure_ready(&self) -> Result<()> {
        if self.is_ready().await {
            return Ok(());
        }
        let _guard = self.rebuild_lock.lock().await;
        // another caller may have finished while we waited for the lock
        if self.is_ready().await {
            return Ok(());
        }
        if self.load_locked().await? {
            return Ok(());
        }
        info!(path = %self.snapshot_path.display(), "no usable snapshot; building search index");
        self.build_locked().await.context("building search index")?;
        Ok(())
    }

    pub async fn search(
        &self,
        kind: EntityKind,
        query: &str,
        limit: Option<usize>,
    ) -> Result<MatchResult, SearchError> {
        let index = self.current().await.ok_or(SearchError::NotReady)?;
        let options = self.options.with_limit(limit);
        Ok(index.search(kind, query, &options))
    }

    pub async fn search_movies(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<MatchResult, SearchError> {
        self.search(EntityKind::Movie, query, limit).await
    }

    pub async fn search_people(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<MatchResult, SearchError> {
        self.search(EntityKind::Person, query, limit).await
    }
}
