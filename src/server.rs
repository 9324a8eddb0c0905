//! HTTP API server.
//!
//! Exposes the [`Syllabus`] service as JSON endpoints.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/health` | Health check (returns version) |
//! | `POST` | `/api/search` | Filtered semantic search |
//! | `POST` | `/api/curriculum` | Assemble a curriculum |
//! | `POST` | `/api/generate-from-prompt` | Cited markdown from a free-form prompt |
//! | `GET`  | `/api/resources?limit=N` | List indexed resources |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "topics must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can call the API directly.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use syllabus_core::assembler::CurriculumRequest;
use syllabus_core::error::RequestError;
use syllabus_core::models::{Curriculum, ResourceRecord};

use crate::prompt::{PromptRequest, PromptResponse};
use crate::service::{SearchRequest, SearchResponse, Syllabus};

/// Build the router. Split from [`run_server`] so tests can serve it on an
/// ephemeral port.
pub fn router(service: Arc<Syllabus>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/search", post(handle_search))
        .route("/api/curriculum", post(handle_curriculum))
        .route("/api/generate-from-prompt", post(handle_generate_from_prompt))
        .route("/api/resources", get(handle_resources))
        .layer(cors)
        .with_state(service)
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(service: Arc<Syllabus>) -> anyhow::Result<()> {
    let bind_addr = service.config().server.bind.clone();
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "HTTP server listening");
    println!("Syllabus API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Caller input errors become 400; everything else is a 500.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<RequestError>() {
            Some(request_err) => bad_request(request_err.to_string()),
            None => {
                error!(error = %err, "request failed");
                internal(format!("{:#}", err))
            }
        }
    }
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/search ============

async fn handle_search(
    State(service): State<Arc<Syllabus>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    Ok(Json(service.search(&request).await?))
}

// ============ POST /api/curriculum ============

async fn handle_curriculum(
    State(service): State<Arc<Syllabus>>,
    payload: Result<Json<CurriculumRequest>, JsonRejection>,
) -> Result<Json<Curriculum>, AppError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    Ok(Json(service.curriculum(&request).await?))
}

// ============ POST /api/generate-from-prompt ============

async fn handle_generate_from_prompt(
    State(service): State<Arc<Syllabus>>,
    payload: Result<Json<PromptRequest>, JsonRejection>,
) -> Result<Json<PromptResponse>, AppError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    Ok(Json(service.generate_from_prompt(&request).await?))
}

// ============ GET /api/resources ============

#[derive(Deserialize)]
struct ResourcesQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ResourcesResponse {
    count: usize,
    resources: Vec<ResourceRecord>,
}

async fn handle_resources(
    State(service): State<Arc<Syllabus>>,
    query: Result<Query<ResourcesQuery>, QueryRejection>,
) -> Result<Json<ResourcesResponse>, AppError> {
    let Query(query) = query.map_err(|e| bad_request(e.body_text()))?;
    let resources = service.resources(query.limit).await?;
    Ok(Json(ResourcesResponse {
        count: resources.len(),
        resources,
    }))
}
