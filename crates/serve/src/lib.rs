//! Thin HTTP facade over the aggregation manager.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use manager::Manager;
use models::{SearchParams, SourceStatus, Vacancy};
use sources::SearchResult;
use std::sync::Arc;

/// Build the facade router around a running manager.
pub fn build_router(manager: Arc<Manager>) -> axum::Router<()> {
    axum::Router::new()
        .route("/v1/search", post(search))
        .route("/v1/vacancies/{source}/{id}", get(vacancy_details))
        .route("/v1/status", get(statuses))
        .route("/healthz", get(healthz))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(manager)
}

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] manager::Error);

impl ApiError {
    fn status_code(&self) -> StatusCode {
        use manager::Error;
        use sources::SourceError;

        match &self.0 {
            Error::QueueFull
            | Error::Overloaded
            | Error::ServiceUnavailable
            | Error::ServiceShutdown
            | Error::NoSources
            | Error::AllSourcesFailed => StatusCode::SERVICE_UNAVAILABLE,
            Error::ExecutionTimeout => StatusCode::GATEWAY_TIMEOUT,
            Error::NotFound { .. } | Error::UnknownSource(_) => StatusCode::NOT_FOUND,
            Error::Source(err) => match err {
                SourceError::Unavailable { .. } | SourceError::Busy { .. } => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                SourceError::Client { status: 404, .. } => StatusCode::NOT_FOUND,
                SourceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
                SourceError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            },
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

async fn search(
    State(manager): State<Arc<Manager>>,
    Json(params): Json<SearchParams>,
) -> Result<Json<Vec<SearchResult>>, ApiError> {
    let results = manager.multi_search(params).await?;
    Ok(Json(results))
}

async fn vacancy_details(
    State(manager): State<Arc<Manager>>,
    Path((source, id)): Path<(String, String)>,
) -> Result<Json<Vacancy>, ApiError> {
    let vacancy = manager.vacancy_details(&source, &id).await?;
    Ok(Json(vacancy))
}

async fn statuses(State(manager): State<Arc<Manager>>) -> Json<Vec<SourceStatus>> {
    Json(manager.statuses())
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use axum::http::StatusCode;
    use manager::Error;
    use sources::SourceError;

    #[test]
    fn errors_map_to_expected_statuses() {
        let cases = [
            (Error::QueueFull, StatusCode::SERVICE_UNAVAILABLE),
            (Error::ExecutionTimeout, StatusCode::GATEWAY_TIMEOUT),
            (
                Error::UnknownSource("linkedin".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                Error::NotFound {
                    name: "hh".to_string(),
                    id: "42".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                Error::Source(SourceError::Client {
                    status: 404,
                    body: String::new(),
                }),
                StatusCode::NOT_FOUND,
            ),
            (
                Error::Source(SourceError::Server {
                    status: 500,
                    body: String::new(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::Internal("panicked".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expect) in cases {
            assert_eq!(ApiError(error).status_code(), expect);
        }
    }
}
