//! HTTP surface: `/`, `/filteredimage`, `/health`.

use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use imgfilter_core::{validate_image_url, Pipeline, PipelineError, ServedArtifact, ValidationError};
use serde::Deserialize;
use serde_json::json;

const USAGE: &str = "try GET /filteredimage?image_url={{}}";

#[derive(Clone)]
pub struct AppState {
    pipeline: Pipeline,
}

/// Builds the application router around `pipeline`.
pub fn router(pipeline: Pipeline) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/filteredimage", get(filtered_image))
        .route("/health", get(health))
        .with_state(AppState { pipeline })
}

#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    image_url: Option<String>,
}

/// Error mapped to a status code and a `{"error": "..."}` body.
#[derive(Debug)]
enum ApiError {
    Validation(ValidationError),
    Pipeline(PipelineError),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Pipeline(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn root() -> &'static str {
    USAGE
}

/// Liveness check: 200 while the process is up.
async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /filteredimage?image_url=<URL>
async fn filtered_image(
    State(state): State<AppState>,
    query: Result<Query<FilterQuery>, QueryRejection>,
) -> Response {
    let raw = match query {
        Ok(Query(q)) => q.image_url,
        Err(e) => {
            tracing::debug!("unparseable query: {}", e);
            return ApiError::from(ValidationError::InvalidUrl).into_response();
        }
    };

    let request = match validate_image_url(raw.as_deref()) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(image_url = ?raw, "rejected: {}", e);
            return ApiError::from(e).into_response();
        }
    };

    match state.pipeline.run(request).await {
        Ok(served) => stream_artifact(served),
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn stream_artifact(served: ServedArtifact) -> Response {
    let headers = [
        (header::CONTENT_TYPE, served.content_type().to_string()),
        (header::CONTENT_LENGTH, served.content_length().to_string()),
    ];
    (StatusCode::OK, headers, Body::from_stream(served.into_stream())).into_response()
}
