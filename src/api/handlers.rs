use axum::Json;
use axum::extract::{Query, State};
use tracing::{debug, instrument};

use crate::indexer::IndexStats;

use super::state::AppState;
use super::types::{
    ApiError, MovieHit, MovieSearchResponse, PersonHit, PersonSearchResponse, SearchParams,
};

const MAX_LIMIT: usize = 50;

pub async fn healthz() -> &'static str {
    "ok"
}

fn requested_limit(params: &SearchParams) -> Option<usize> {
    params.limit.map(|limit| limit.clamp(1, MAX_LIMIT))
}

#[instrument(skip_all)]
pub async fn search_movies(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<MovieSearchResponse>, ApiError> {
    let query = params.query.as_deref().unwrap_or("");
    let results = state
        .search
        .search_movies(query, requested_limit(&params))
        .await?;
    debug!(query, count = results.len(), "movie search");

    Ok(Json(MovieSearchResponse {
        results: results.into_iter().map(MovieHit::from).collect(),
    }))
}

#[instrument(skip_all)]
pub async fn search_people(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<PersonSearchResponse>, ApiError> {
    let query = params.query.as_deref().unwrap_or("");
    let results = state
        .search
        .search_people(query, requested_limit(&params))
        .await?;
    debug!(query, count = results.len(), "person search");

    Ok(Json(PersonSearchResponse {
        results: results.into_iter().map(PersonHit::from).collect(),
    }))
}

#[instrument(skip_all)]
pub async fn rebuild_index(State(state): State<AppState>) -> Result<Json<IndexStats>, ApiError> {
    let stats = state.search.rebuild_index().await?;
    Ok(Json(stats))
}
