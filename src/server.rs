//! HTTP API over the content store and extraction runs.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Store health, wrapped with a timestamp |
//! | `GET`  | `/health/connection` | Connection test |
//! | `GET`  | `/extractions/{platform}` | Ledger entry, or `not_run` |
//! | `POST` | `/extractions/{platform}/runs` | Start a background run (202) |
//! | `POST` | `/extractions/{platform}/search` | Search pinned to the extractor's source |
//! | `GET`  | `/runs/{id}` | Run status |
//! | `DELETE` | `/runs/{id}` | Cancel a run |
//! | `POST` | `/search` | Search all assets |
//! | `GET`  | `/assets/{id}` | Asset with its relationships |
//! | `DELETE` | `/assets/{id}` | Hard delete |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `conflict` (409),
//! `store_unavailable` (503).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser dashboards can
//! poll health and run status directly.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::controller::{ExtractionController, RunStatus};
use crate::error::{DispatchError, StoreError};
use crate::extractor::{extractor_for, SourceExtractor};
use crate::models::{iso_now, ContentAsset, HealthStatus, Relationship, SearchFilters};
use crate::runs::{RunRecord, RunRegistry};
use crate::search::search_assets;
use crate::status::{extraction_stats, ExtractionStats};
use crate::store::{ContentStore, SqliteStore};

const SERVICE: &str = "knowledge-harness";

/// Shared state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<dyn ContentStore>,
    runs: RunRegistry,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ContentStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            runs: RunRegistry::new(),
        }
    }

    pub fn runs(&self) -> &RunRegistry {
        &self.runs
    }

    fn extractor(&self, platform: &str) -> Result<Arc<dyn SourceExtractor>, AppError> {
        extractor_for(&self.config, platform).ok_or_else(|| {
            not_found(format!("no extractor configured for platform: {}", platform))
        })
    }
}

/// All routes with CORS applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/health/connection", get(handle_connection))
        .route("/extractions/{platform}", get(handle_extraction_stats))
        .route("/extractions/{platform}/runs", post(handle_dispatch))
        .route("/extractions/{platform}/search", post(handle_platform_search))
        .route("/runs/{id}", get(handle_run_status).delete(handle_run_cancel))
        .route("/search", post(handle_search))
        .route("/assets/{id}", get(handle_get_asset).delete(handle_remove_asset))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `[server].bind` until Ctrl-C, then release the store.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let store = Arc::new(SqliteStore::open(&config.store));
    let state = AppState::new(config.clone(), store.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("listening on http://{}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    store.manager().release().await;
    info!("server stopped");
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
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "store_unavailable",
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn conflict(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "conflict",
        message: message.into(),
    }
}

// ============ Health ============

#[derive(Serialize)]
struct HealthResponse {
    timestamp: String,
    service: &'static str,
    #[serde(flatten)]
    health: HealthStatus,
}

/// Always 200: an unreachable store is reported as `connected: false`.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        timestamp: iso_now(),
        service: SERVICE,
        health: state.store.health_status().await,
    })
}

#[derive(Serialize)]
struct ConnectionResponse {
    connected: bool,
    timestamp: String,
    message: &'static str,
}

async fn handle_connection(State(state): State<AppState>) -> Json<ConnectionResponse> {
    let connected = state.store.test_connection().await;
    Json(ConnectionResponse {
        connected,
        timestamp: iso_now(),
        message: if connected {
            "Connection successful"
        } else {
            "Connection failed"
        },
    })
}

// ============ Extractions ============

#[derive(Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    stats: ExtractionStats,
    timestamp: String,
}

async fn handle_extraction_stats(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> Result<Json<StatsResponse>, AppError> {
    let stats = extraction_stats(state.store.as_ref(), &platform).await?;
    Ok(Json(StatsResponse {
        stats,
        timestamp: iso_now(),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DispatchResponse {
    message: String,
    extraction_id: String,
    status: RunStatus,
}

/// Starts a run and answers immediately with `202 Accepted`.
async fn handle_dispatch(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> Result<(StatusCode, Json<DispatchResponse>), AppError> {
    let extractor = state.extractor(&platform)?;
    let controller = ExtractionController::new(extractor, state.store.clone());

    let id = state.runs.dispatch(controller).await.map_err(|e| match e {
        DispatchError::AlreadyRunning { .. } => conflict(e.to_string()),
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DispatchResponse {
            message: format!("{} content extraction started", platform),
            extraction_id: id,
            status: RunStatus::Running,
        }),
    ))
}

async fn handle_run_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunRecord>, AppError> {
    state
        .runs
        .status(&id)
        .await
        .map(Json)
        .ok_or_else(|| not_found(format!("run not found: {}", id)))
}

async fn handle_run_cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunRecord>, AppError> {
    state
        .runs
        .cancel(&id)
        .await
        .map(Json)
        .ok_or_else(|| not_found(format!("run not found: {}", id)))
}

// ============ Search ============

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    filters: SearchFilters,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    query: String,
    results: Vec<ContentAsset>,
    total: usize,
    has_more: bool,
    filters: SearchFilters,
}

async fn run_search(
    state: &AppState,
    query: String,
    filters: SearchFilters,
) -> Result<Json<SearchResponse>, AppError> {
    if query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let page = search_assets(state.store.as_ref(), &query, &filters)
        .await
        .map_err(|e| match e.downcast::<StoreError>() {
            Ok(store_err) => AppError::from(store_err),
            Err(other) => bad_request(other.to_string()),
        })?;

    Ok(Json(SearchResponse {
        query,
        total: page.total,
        has_more: page.has_more,
        results: page.items,
        filters,
    }))
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    run_search(&state, req.query, req.filters).await
}

/// Like `/search`, with `source` pinned to the extractor's tag.
async fn handle_platform_search(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let extractor = state.extractor(&platform)?;
    let filters = SearchFilters {
        source: Some(extractor.source().to_string()),
        ..req.filters
    };
    run_search(&state, req.query, filters).await
}

// ============ Assets ============

#[derive(Serialize)]
struct AssetResponse {
    asset: ContentAsset,
    relationships: Vec<Relationship>,
}

async fn handle_get_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AssetResponse>, AppError> {
    let asset = state
        .store
        .get(&id)
        .await?
        .ok_or_else(|| not_found(format!("asset not found: {}", id)))?;
    let relationships = state.store.relationships(&id).await?;
    Ok(Json(AssetResponse {
        asset,
        relationships,
    }))
}

#[derive(Serialize)]
struct RemoveResponse {
    id: String,
    removed: bool,
}

async fn handle_remove_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RemoveResponse>, AppError> {
    let removed = state.store.get(&id).await?.is_some();
    state.store.remove(&id).await?;
    Ok(Json(RemoveResponse { id, removed }))
}
