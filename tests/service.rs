use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::anyhow;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use movie_search::indexer::{EntityKind, SearchIndex, SearchableRecord};
use movie_search::records::{MemoryRecordSource, RecordSource, SqliteRecordSource};
use movie_search::search::SearchOptions;
use movie_search::service::{SearchError, SearchService};
use movie_search::snapshot::{load_snapshot, save_snapshot};
use rusqlite::{Connection, params};
use tempfile::tempdir;

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

fn ids(records: &[SearchableRecord]) -> Vec<i64> {
    records.iter().map(|record| record.id).collect()
}

fn sample_source() -> MemoryRecordSource {
    MemoryRecordSource::new(
        vec![
            SearchableRecord::new(1, "Star Wars"),
            SearchableRecord::new(2, "Star Trek"),
        ],
        vec![SearchableRecord::new(5, "Christopher Nolan")],
    )
}

/// Wraps a source, counting fetches and failing on demand.
struct FlakySource {
    inner: MemoryRecordSource,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl FlakySource {
    fn new(inner: MemoryRecordSource, failing: bool) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(failing),
            fetches: AtomicUsize::new(0),
        }
    }
}

impl RecordSource for FlakySource {
    fn fetch(&self, kind: EntityKind) -> BoxFuture<'_, anyhow::Result<Vec<SearchableRecord>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return async move { Err(anyhow!("database is unreachable")) }.boxed();
        }
        self.inner.fetch(kind)
    }
}

fn service(source: Arc<dyn RecordSource>, snapshot: &Path) -> SearchService {
    SearchService::new(source, snapshot, SearchOptions::default())
}

#[tokio::test]
async fn searches_fail_until_index_is_ready() -> TestResult<()> {
    let dir = tempdir()?;
    let search = service(Arc::new(sample_source()), &dir.path().join("index.json"));

    assert!(!search.is_ready().await);
    assert!(matches!(
        search.search_movies("star wars", None).await,
        Err(SearchError::NotReady)
    ));

    search.ensure_ready().await?;
    assert!(search.is_ready().await);
    assert_eq!(ids(&search.search_movies("star wars", None).await?), vec![1, 2]);
    assert_eq!(ids(&search.search_people("nolan", None).await?), vec![5]);
    Ok(())
}

#[tokio::test]
async fn first_start_builds_and_writes_snapshot() -> TestResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("index.json");
    let source = Arc::new(FlakySource::new(sample_source(), false));
    let search = service(source.clone(), &path);

    assert!(!search.load().await?);
    search.ensure_ready().await?;

    assert!(path.exists());
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    let stats = search.stats().await.expect("index should be installed");
    assert_eq!(stats.movies, 2);
    assert_eq!(stats.people, 1);
    Ok(())
}

#[tokio::test]
async fn later_start_loads_snapshot_without_touching_source() -> TestResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("index.json");
    service(Arc::new(sample_source()), &path).ensure_ready().await?;

    let unreachable = Arc::new(FlakySource::new(MemoryRecordSource::default(), true));
    let search = service(unreachable.clone(), &path);
    search.ensure_ready().await?;

    assert_eq!(unreachable.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(ids(&search.search_movies("Star Wars", None).await?), vec![1, 2]);
    Ok(())
}

#[tokio::test]
async fn malformed_snapshot_triggers_rebuild() -> TestResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("index.json");
    std::fs::write(&path, b"{ not json")?;

    let search = service(Arc::new(sample_source()), &path);
    search.ensure_ready().await?;

    assert_eq!(ids(&search.search_people("Nolan", None).await?), vec![5]);
    let rewritten: serde_json::Value = serde_json::from_slice(&std::fs::read(&path)?)?;
    assert!(rewritten["people"]["fullNames"]["christopher nolan"].is_array());
    Ok(())
}

#[tokio::test]
async fn unreachable_source_without_snapshot_is_fatal() -> TestResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("index.json");
    let source = Arc::new(FlakySource::new(sample_source(), true));
    let search = service(source, &path);

    let err = search.ensure_ready().await.expect_err("startup should fail");
    assert!(format!("{:#}", err).contains("database is unreachable"));
    assert!(!search.is_ready().await);
    assert!(!path.exists());
    Ok(())
}

#[tokio::test]
async fn rebuild_drops_removed_records() -> TestResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("index.json");
    let source = Arc::new(sample_source());
    let search = service(source.clone(), &path);
    search.ensure_ready().await?;
    assert!(ids(&search.search_movies("star wars", None).await?).contains(&1));

    source.replace(EntityKind::Movie, vec![SearchableRecord::new(2, "Star Trek")])?;
    // not visible until the index is rebuilt
    assert!(ids(&search.search_movies("star wars", None).await?).contains(&1));

    let stats = search.rebuild_index().await?;
    assert_eq!(stats.movies, 1);
    assert!(!ids(&search.search_movies("star wars", None).await?).contains(&1));

    let reloaded = service(Arc::new(MemoryRecordSource::default()), &path);
    assert!(reloaded.load().await?);
    assert!(!ids(&reloaded.search_movies("star wars", None).await?).contains(&1));
    Ok(())
}

#[tokio::test]
async fn failed_rebuild_keeps_serving_previous_index() -> TestResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("index.json");
    let source = Arc::new(FlakySource::new(sample_source(), false));
    let search = service(source.clone(), &path);
    search.ensure_ready().await?;
    let before = std::fs::read(&path)?;

    source.failing.store(true, Ordering::SeqCst);
    assert!(search.rebuild_index().await.is_err());

    assert_eq!(ids(&search.search_movies("star wars", None).await?), vec![1, 2]);
    assert_eq!(std::fs::read(&path)?, before);
    Ok(())
}

#[tokio::test]
async fn limit_overrides_configured_default() -> TestResult<()> {
    let dir = tempdir()?;
    let movies = (0..20)
        .map(|n| SearchableRecord::new(n, format!("Friday the 13th Part {}", n)))
        .collect();
    let source = Arc::new(MemoryRecordSource::new(movies, Vec::new()));
    let search = SearchService::new(
        source,
        dir.path().join("index.json"),
        SearchOptions {
            limit: 4,
            max_edits: 2,
        },
    );
    search.ensure_ready().await?;

    assert_eq!(search.search_movies("friday", None).await?.len(), 4);
    assert_eq!(search.search_movies("friday", Some(15)).await?.len(), 15);
    Ok(())
}

fn seed_database(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "CREATE TABLE movie (movie_id INTEGER PRIMARY KEY, title TEXT);
         CREATE TABLE person (person_id INTEGER PRIMARY KEY, person_name TEXT);",
    )?;
    for (id, title) in [(19995, Some("Avatar")), (285, Some("Pirates of the Caribbean")), (7, None)] {
        conn.execute(
            "INSERT INTO movie (movie_id, title) VALUES (?1, ?2)",
            params![id, title],
        )?;
    }
    for (id, name) in [(65731, "Sam Worthington"), (2710, "James Cameron")] {
        conn.execute(
            "INSERT INTO person (person_id, person_name) VALUES (?1, ?2)",
            params![id, name],
        )?;
    }
    Ok(conn)
}

#[tokio::test]
async fn sqlite_source_reads_labelled_rows() -> TestResult<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("movies.db");
    seed_database(&db_path)?;

    let source = SqliteRecordSource::new(&db_path);
    let mut movies = source.fetch(EntityKind::Movie).await?;
    movies.sort_by_key(|record| record.id);
    assert_eq!(ids(&movies), vec![285, 19995]);

    let people = source.fetch(EntityKind::Person).await?;
    assert_eq!(people.len(), 2);
    Ok(())
}

#[tokio::test]
async fn sqlite_backed_rebuild_reflects_deleted_rows() -> TestResult<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("movies.db");
    let conn = seed_database(&db_path)?;

    let search = service(
        Arc::new(SqliteRecordSource::new(&db_path)),
        &dir.path().join("index.json"),
    );
    search.ensure_ready().await?;
    assert_eq!(ids(&search.search_movies("avatar", None).await?), vec![19995]);
    assert_eq!(ids(&search.search_people("cameron", None).await?), vec![2710]);

    conn.execute("DELETE FROM movie WHERE movie_id = ?1", params![19995])?;
    search.rebuild_index().await?;
    assert!(search.search_movies("avatar", None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_database_fails_fetch() -> TestResult<()> {
    let dir = tempdir()?;
    let source = SqliteRecordSource::new(dir.path().join("absent.db"));
    assert!(source.fetch(EntityKind::Movie).await.is_err());
    Ok(())
}

fn numbered_movies(count: usize) -> Vec<SearchableRecord> {
    (1..=count as i64)
        .map(|id| SearchableRecord::new(id, format!("Movie {}", id)))
        .collect()
}

/// Each build sees one more movie than the build before it.
#[derive(Default)]
struct GrowingSource {
    builds: AtomicUsize,
}

impl RecordSource for GrowingSource {
    fn fetch(&self, kind: EntityKind) -> BoxFuture<'_, anyhow::Result<Vec<SearchableRecord>>> {
        let records = match kind {
            EntityKind::Movie => numbered_movies(self.builds.fetch_add(1, Ordering::SeqCst) + 1),
            EntityKind::Person => Vec::new(),
        };
        async move { Ok(records) }.boxed()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn load_racing_rebuild_never_reinstalls_stale_snapshot() -> TestResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("index.json");
    let fresh = MemoryRecordSource::new(
        vec![SearchableRecord::new(1, "Movie 1")],
        Vec::new(),
    );
    let search = Arc::new(service(Arc::new(fresh), &path));

    for _ in 0..5 {
        let stale = SearchIndex::build(numbered_movies(5_000), Vec::new());
        save_snapshot(&path, &stale).await?;

        let loading = tokio::spawn({
            let search = search.clone();
            async move { search.load().await }
        });
        let rebuilding = tokio::spawn({
            let search = search.clone();
            async move { search.rebuild_index().await }
        });
        assert!(loading.await??);
        assert_eq!(rebuilding.await??.movies, 1);

        assert_eq!(search.stats().await.map(|stats| stats.movies), Some(1));
        let on_disk = load_snapshot(&path).await?.expect("snapshot should load");
        assert_eq!(on_disk.stats().movies, 1);
        // only the shared "movie" token remains
        assert_eq!(ids(&search.search_movies("Movie 4242", None).await?), vec![1]);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rebuilds_leave_the_last_build_installed() -> TestResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("index.json");
    let search = Arc::new(service(Arc::new(GrowingSource::default()), &path));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let search = search.clone();
            tokio::spawn(async move { search.rebuild_index().await })
        })
        .collect();
    let mut built = Vec::new();
    for handle in handles {
        built.push(handle.await??.movies);
    }
    built.sort();
    assert_eq!(built, vec![1, 2, 3, 4, 5, 6]);

    let installed = search.stats().await.expect("index should be installed");
    assert_eq!(installed.movies, 6);
    let on_disk = load_snapshot(&path).await?.expect("snapshot should load");
    assert_eq!(on_disk.stats(), installed);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ensure_ready_builds_once() -> TestResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("index.json");
    let source = Arc::new(FlakySource::new(sample_source(), false));
    let search = Arc::new(service(source.clone(), &path));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let search = search.clone();
            tokio::spawn(async move { search.ensure_ready().await })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }

    // one build fetches movies and people once each
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    assert!(path.exists());
    assert_eq!(ids(&search.search_movies("star wars", None).await?), vec![1, 2]);
    Ok(())
}
