//! HTTP routes.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use regscope_core::CrawlResult;
use regscope_crawler::{CrawlError, Crawler};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

const MISSING_QUERY: &str = "Company name or number is required";

#[derive(Clone)]
pub struct AppState {
    pub crawler: Arc<Crawler>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    from: Option<String>,
}

pub enum ApiError {
    MissingQuery,
    Crawl(CrawlError),
}

impl From<CrawlError> for ApiError {
    fn from(err: CrawlError) -> Self {
        Self::Crawl(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingQuery => (StatusCode::BAD_REQUEST, MISSING_QUERY.to_string()),
            Self::Crawl(e) => {
                error!(error = %e, "search failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", get(search))
        .route("/search", get(search))
        .route("/health", get(health))
        .with_state(state)
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<CrawlResult>, ApiError> {
    let query = params
        .from
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or(ApiError::MissingQuery)?;

    let result = state.crawler.crawl(query).await?;
    Ok(Json(result))
}

async fn health() -> &'static str {
    "ok"
}
