use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

use crate::search::{DEFAULT_LIMIT, DEFAULT_MAX_EDITS, SearchOptions};

/// Application configuration driven by environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub result_limit: usize,
    pub max_edits: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let data_dir = env::var("MOVIE_SEARCH_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let database_path = env::var("MOVIE_SEARCH_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("movies.db"));

        let snapshot_path = env::var("MOVIE_SEARCH_SNAPSHOT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("search_index.json"));

        let bind_addr: SocketAddr = env::var("MOVIE_SEARCH_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .context("parsing MOVIE_SEARCH_BIND_ADDR")?;

        let result_limit = parse_usize("MOVIE_SEARCH_RESULT_LIMIT", DEFAULT_LIMIT)?;
        let max_edits = parse_usize("MOVIE_SEARCH_MAX_EDITS", DEFAULT_MAX_EDITS)?;

        Ok(Self {
            data_dir,
            database_path,
            snapshot_path,
            bind_addr,
            result_limit,
            max_edits,
        })
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            limit: self.result_limit,
            max_edits: self.max_edits,
        }
    }
}

fn parse_usize(key: &str, default: usize) -> anyhow::Result<usize> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("parsing {} from {:?}", key, value)),
        Err(_) => Ok(default),
    }
}
