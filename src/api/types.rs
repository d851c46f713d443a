use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::indexer::SearchableRecord;
use crate::service::SearchError;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MovieSearchResponse {
    pub results: Vec<MovieHit>,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieHit {
    pub id: i64,
    pub title: String,
}

impl From<SearchableRecord> for MovieHit {
    fn from(record: SearchableRecord) -> Self {
        Self {
            id: record.id,
            title: record.label,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PersonSearchResponse {
    pub results: Vec<PersonHit>,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonHit {
    pub id: i64,
    pub name: String,
}

impl From<SearchableRecord> for PersonHit {
    fn from(record: SearchableRecord) -> Self {
        Self {
            id: record.id,
            name: record.label,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<anyhow::Error>,
}

impl ApiError {
    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal server error".to_string(),
            detail: Some(err),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
            detail: None,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if let Some(detail) = &self.detail {
            tracing::error!(error = %format!("{:#}", detail));
        }
        let body = Json(ErrorBody {
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        ApiError::internal(value)
    }
}

impl From<SearchError> for ApiError {
    fn from(value: SearchError) -> Self {
        match value {
            SearchError::NotReady => ApiError::unavailable(value.to_string()),
        }
    }
}
