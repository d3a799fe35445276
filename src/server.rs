#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::Instrument;
use utoipa::openapi::OpenApi;
use uuid::Uuid;

use crate::{
    constants::{API_TITLE, DOCS_PATH, GRADING_FAILED_MESSAGE, HEALTHY_MESSAGE},
    docs::SWAGGER_UI_HTML,
    grade::{Grader, TextGenerator},
    types::GradeRequest,
};

/// Shared, read-only state handed to every request.
pub struct AppState<G> {
    /// Grades incoming submissions.
    grader:   Arc<Grader<G>>,
    /// API description served to the docs UI.
    api_spec: Arc<OpenApi>,
}

impl<G> Clone for AppState<G> {
    fn clone(&self) -> Self {
        Self {
            grader:   Arc::clone(&self.grader),
            api_spec: Arc::clone(&self.api_spec),
        }
    }
}

impl<G: TextGenerator> AppState<G> {
    /// Bundles the grader and API description.
    pub fn new(grader: Grader<G>, api_spec: OpenApi) -> Self {
        Self {
            grader:   Arc::new(grader),
            api_spec: Arc::new(api_spec),
        }
    }
}

/// JSON error body: `{ "error": "..." }`.
#[derive(Serialize)]
struct ErrorBody {
    /// Message shown to the caller.
    error: &'static str,
}

/// Body of `GET /`.
#[derive(Serialize)]
struct Index {
    /// Service name.
    message: &'static str,
    /// Where the docs live.
    docs:    &'static str,
}

/// Builds the application router.
pub fn router<G: TextGenerator + 'static>(state: AppState<G>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route(DOCS_PATH, get(api_docs))
        .route("/api-docs/openapi.json", get(openapi_json::<G>))
        .route("/grade-essay", post(grade_essay::<G>))
        .with_state(state)
}

/// `GET /`
async fn index() -> Json<Index> {
    Json(Index {
        message: API_TITLE,
        docs:    DOCS_PATH,
    })
}

/// `GET /health`. Does not touch the text-generation service.
async fn health() -> &'static str {
    HEALTHY_MESSAGE
}

/// `GET /api-docs`
async fn api_docs() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

/// `GET /api-docs/openapi.json`
async fn openapi_json<G: TextGenerator + 'static>(State(state): State<AppState<G>>) -> Json<OpenApi> {
    Json(state.api_spec.as_ref().clone())
}

/// `POST /grade-essay`
///
/// * 400 when a field is missing; the model is never called.
/// * 200 with the grade report, or with `{error, raw}` when the model's reply
///   could not be parsed.
/// * 500 when the model could not be called at all.
async fn grade_essay<G: TextGenerator + 'static>(
    State(state): State<AppState<G>>,
    body: Bytes,
) -> Response {
    let span = tracing::info_span!("grade_essay", request_id = %Uuid::new_v4());

    async move {
        tracing::info!(body = %String::from_utf8_lossy(&body), "Incoming body");

        let request = match GradeRequest::from_json(&body) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Rejected grading request: {e}");
                return (StatusCode::BAD_REQUEST, Json(ErrorBody { error: e.public_message() }))
                    .into_response();
            }
        };

        match state.grader.grade(&request).await {
            Ok(result) => Json(result).into_response(),
            Err(e) => {
                tracing::error!("{:#}", anyhow::Error::new(e));
                (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody {
                    error: GRADING_FAILED_MESSAGE,
                }))
                    .into_response()
            }
        }
    }
    .instrument(span)
    .await
}
