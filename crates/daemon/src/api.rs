//! HTTP control API for Stream Bridge
//!
//! Thin translation layer from REST-ish requests to registry operations. All
//! responses are JSON; errors are `{"error": string}` objects with a 4xx/5xx
//! status, and every response permits any origin.

use crate::registry::{LogEntry, Registry, RegistryError, TaskKind, TaskRecord, TaskStatus};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<Registry>,
}

/// API-level error carrying an HTTP status and a client-facing message
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::MissingSource | RegistryError::RouterUnavailable => {
                ApiError::bad_request(err.to_string())
            }
            RegistryError::Worker(e) => ApiError::internal(e.to_string()),
        }
    }
}

/// Request body for POST /streams
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStreamRequest {
    pub name: Option<String>,
    pub path: Option<String>,
}

/// Request body for POST /conversions
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversionRequest {
    pub source_url: Option<String>,
    pub rtsp_port: Option<u16>,
    pub stream_path: Option<String>,
}

/// Test-stream representation on the wire
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub path: String,
    pub ingest_url: String,
    pub status: TaskStatus,
}

impl From<&TaskRecord> for StreamResponse {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            path: record.stream_path.clone(),
            ingest_url: record.destination_url.clone(),
            status: record.status,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

/// Handler for GET /streams
async fn list_streams(State(state): State<ApiState>) -> Json<Vec<StreamResponse>> {
    let streams = state.registry.list_streams().await;
    Json(streams.iter().map(StreamResponse::from).collect())
}

/// Handler for POST /streams
async fn create_stream(
    State(state): State<ApiState>,
    body: Option<Json<CreateStreamRequest>>,
) -> Result<Json<StreamResponse>, ApiError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let record = state.registry.start_test_stream(req.name, req.path).await?;
    Ok(Json(StreamResponse::from(&record)))
}

/// Handler for DELETE /streams/:id
async fn delete_stream(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    match state.registry.get(&id).await {
        Some(record) if record.kind == TaskKind::TestStream => {
            state.registry.stop(&id).await;
            Ok(Json(MessageResponse {
                message: "Stream stopped successfully".to_string(),
            }))
        }
        _ => Err(ApiError::not_found("Stream not found")),
    }
}

/// Handler for GET /conversions
async fn list_conversions(State(state): State<ApiState>) -> Json<Vec<TaskRecord>> {
    Json(state.registry.list_conversions().await)
}

/// Handler for POST /conversions
async fn create_conversion(
    State(state): State<ApiState>,
    body: Option<Json<CreateConversionRequest>>,
) -> Result<Json<TaskRecord>, ApiError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let source = req.source_url.unwrap_or_default();
    if source.trim().is_empty() {
        return Err(ApiError::bad_request("sourceUrl is required"));
    }

    let record = state
        .registry
        .start_conversion(&source, req.rtsp_port, req.stream_path)
        .await?;
    Ok(Json(record))
}

/// Look up a conversion record, mapping absence and kind mismatch to 404.
async fn find_conversion(state: &ApiState, id: &str) -> Result<TaskRecord, ApiError> {
    match state.registry.get(id).await {
        Some(record) if record.kind == TaskKind::Conversion => Ok(record),
        _ => Err(ApiError::not_found("Conversion not found")),
    }
}

/// Handler for GET /conversions/:id
async fn get_conversion(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<TaskRecord>, ApiError> {
    let record = find_conversion(&state, &id).await?;
    Ok(Json(record))
}

/// Handler for GET /conversions/:id/logs
async fn get_conversion_logs(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    find_conversion(&state, &id).await?;
    let logs = state
        .registry
        .get_logs(&id)
        .await
        .ok_or_else(|| ApiError::not_found("Conversion not found"))?;
    Ok(Json(logs))
}

/// Handler for DELETE /conversions/:id
async fn delete_conversion(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    find_conversion(&state, &id).await?;
    state.registry.stop(&id).await;
    Ok(Json(MessageResponse {
        message: "Conversion stopped successfully".to_string(),
    }))
}

/// Create the axum Router for the control API.
///
/// The registry is injected rather than imported as ambient state, so tests
/// and the daemon assemble their own instances.
pub fn create_api_router(registry: Arc<Registry>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/streams", get(list_streams).post(create_stream))
        .route("/streams/:id", delete(delete_stream))
        .route(
            "/conversions",
            get(list_conversions).post(create_conversion),
        )
        .route(
            "/conversions/:id",
            get(get_conversion).delete(delete_conversion),
        )
        .route("/conversions/:id/logs", get(get_conversion_logs))
        .layer(cors)
        .with_state(ApiState { registry })
}
