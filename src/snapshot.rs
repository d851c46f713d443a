//! JSON persistence for a [`SearchIndex`].
//!
//! The file layout matches the application's existing `search_index.json`:
//! a `movies` section keyed `fullTitles`/`tokens` with `{id, title}` entries
//! and a `people` section keyed `fullNames`/`tokens` with `{id, name}` entries.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::indexer::{EntityKind, Index, LabelMap, SearchIndex, SearchableRecord};

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    movies: MovieSection,
    people: PersonSection,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovieSection {
    full_titles: BTreeMap<String, Vec<MovieEntry>>,
    tokens: BTreeMap<String, Vec<MovieEntry>>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonSection {
    full_names: BTreeMap<String, Vec<PersonEntry>>,
    tokens: BTreeMap<String, Vec<PersonEntry>>,
}

#[derive(Serialize, Deserialize)]
struct MovieEntry {
    id: i64,
    title: String,
}

#[derive(Serialize, Deserialize)]
struct PersonEntry {
    id: i64,
    name: String,
}

impl From<MovieEntry> for SearchableRecord {
    fn from(entry: MovieEntry) -> Self {
        SearchableRecord::new(entry.id, entry.title)
    }
}

impl From<&SearchableRecord> for MovieEntry {
    fn from(record: &SearchableRecord) -> Self {
        Self {
            id: record.id,
            title: record.label.clone(),
        }
    }
}

impl From<PersonEntry> for SearchableRecord {
    fn from(entry: PersonEntry) -> Self {
        SearchableRecord::new(entry.id, entry.name)
    }
}

impl From<&SearchableRecord> for PersonEntry {
    fn from(record: &SearchableRecord) -> Self {
        Self {
            id: record.id,
            name: record.label.clone(),
        }
    }
}

fn to_entries<E>(map: &LabelMap) -> BTreeMap<String, Vec<E>>
where
    E: for<'a> From<&'a SearchableRecord>,
{
    map.iter()
        .map(|(key, records)| (key.clone(), records.iter().map(E::from).collect()))
        .collect()
}

fn to_records<E>(map: BTreeMap<String, Vec<E>>) -> LabelMap
where
    SearchableRecord: From<E>,
{
    map.into_iter()
        .map(|(key, entries)| {
            (
                key,
                entries.into_iter().map(SearchableRecord::from).collect(),
            )
        })
        .collect()
}

pub fn encode(index: &SearchIndex) -> Result<Vec<u8>> {
    let file = SnapshotFile {
        movies: MovieSection {
            full_titles: to_entries(index.movies.full_labels()),
            tokens: to_entries(index.movies.tokens()),
        },
        people: PersonSection {
            full_names: to_entries(index.people.full_labels()),
            tokens: to_entries(index.people.tokens()),
        },
    };
    serde_json::to_vec_pretty(&file).context("serializing search index snapshot")
}

pub fn decode(bytes: &[u8]) -> Result<SearchIndex> {
    let file: SnapshotFile =
        serde_json::from_slice(bytes).context("parsing search index snapshot")?;

    let movies = Index::from_parts(
        EntityKind::Movie,
        to_records(file.movies.full_titles),
        to_records(file.movies.tokens),
    )
    .context("validating movie index")?;
    let people = Index::from_parts(
        EntityKind::Person,
        to_records(file.people.full_names),
        to_records(file.people.tokens),
    )
    .context("validating person index")?;

    Ok(SearchIndex { movies, people })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes the snapshot next to `path` and renames it into place, so a failed
/// write never clobbers the previous snapshot. The temporary file is removed
/// when any step fails.
pub async fn save_snapshot(path: &Path, index: &SearchIndex) -> Result<()> {
    let bytes = encode(index)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating snapshot directory {}", parent.display()))?;
    }

    let tmp_path = temp_path(path);
    if let Err(err) = write_and_replace(&tmp_path, path, &bytes).await {
        match fs::remove_file(&tmp_path).await {
            Ok(()) => {}
            Err(remove_err) if remove_err.kind() == ErrorKind::NotFound => {}
            Err(remove_err) => {
                warn!(path = %tmp_path.display(), error = %remove_err, "unable to remove partial snapshot");
            }
        }
        return Err(err);
    }

    debug!(path = %path.display(), bytes = bytes.len(), "wrote search index snapshot");
    Ok(())
}

async fn write_and_replace(tmp_path: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut dest = fs::File::create(tmp_path)
        .await
        .with_context(|| format!("creating {}", tmp_path.display()))?;
    dest.write_all(bytes)
        .await
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    dest.flush()
        .await
        .with_context(|| format!("flushing {}", tmp_path.display()))?;
    dest.sync_all()
        .await
        .with_context(|| format!("syncing {}", tmp_path.display()))?;
    drop(dest);

    fs::rename(tmp_path, path)
        .await
        .with_context(|| format!("moving snapshot into place at {}", path.display()))
}

/// Returns `None` when there is no usable snapshot at `path`.
pub async fn load_snapshot(path: &Path) -> Result<Option<SearchIndex>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no search index snapshot");
            return Ok(None);
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unable to read search index snapshot");
            return Ok(None);
        }
    };

    let decoded = tokio::task::spawn_blocking(move || decode(&bytes))
        .await
        .context("joining snapshot decode task")?;

    match decoded {
        Ok(index) => Ok(Some(index)),
        Err(err) => {
            warn!(path = %path.display(), error = %format!("{:#}", err), "discarding malformed search index snapshot");
            Ok(None)
        }
    }
}
