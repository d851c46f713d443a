use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::service::SearchService;

use super::handlers::{healthz, rebuild_index, search_movies, search_people};

#[derive(Clone)]
pub struct AppState {
    pub(crate) search: Arc<SearchService>,
}

impl AppState {
    pub fn new(search: Arc<SearchService>) -> Self {
        Self { search }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/movies/search", get(search_movies))
        .route("/people/search", get(search_people))
        .route("/admin/rebuild", post(rebuild_index))
        .with_state(state)
}
