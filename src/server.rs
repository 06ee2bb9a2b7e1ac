//! HTTP server for sensor ingest and dashboard queries.
//!
//! # Architecture
//!
//! ```text
//! Sensor / Simulator ──→ POST /ingest ──→ Ingestor ──→ Store (SQLite)
//!                                            │
//! Dashboard ──→ GET /exposure, /stats ───────┘
//! ```

use crate::core::{ExposureReport, ExposureWindow, StatsReport};
use crate::ingest::{IngestError, IngestOutcome, Ingestor, ReadingIn, SeedOutcome, SeedRequest};
use crate::store::{AlertEvent, Reading, ReadingQuery, StoreError};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: IpAddr,
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Window used when a query omits one
    pub default_window: String,
}

impl ServerConfig {
    /// Create a new server configuration bound to loopback
    pub fn new(port: u16) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            default_window: "24h".to_string(),
        }
    }
}

/// Shared server state
pub struct ServerState {
    ingestor: Ingestor,
    default_window: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn store_error(e: StoreError) -> ApiError {
    tracing::error!("Store error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
            code: "STORE_ERROR".to_string(),
        }),
    )
}

fn bad_request(code: &str, error: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error,
            code: code.to_string(),
        }),
    )
}

fn parse_window(raw: Option<&str>, default: &str) -> Result<ExposureWindow, ApiError> {
    let text = raw.filter(|w| !w.is_empty()).unwrap_or(default);
    text.parse()
        .map_err(|e| bad_request("INVALID_WINDOW", format!("Invalid window '{text}': {e}")))
}

/// Blank site parameters mean "all sites".
fn site_filter(site: Option<String>) -> Option<String> {
    site.filter(|s| !s.is_empty())
}

/// Response for GET /
#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub ok: bool,
    pub db: String,
    pub last: Option<chrono::DateTime<chrono::Utc>>,
    pub count: u64,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct ReadingsParams {
    #[serde(default = "default_readings_limit")]
    pub limit: usize,
    pub site: Option<String>,
    pub window: Option<String>,
}

fn default_readings_limit() -> usize {
    500
}

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    pub window: Option<String>,
    pub site: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventsParams {
    #[serde(default = "default_events_limit")]
    pub limit: usize,
    pub site: Option<String>,
}

fn default_events_limit() -> usize {
    100
}

#[derive(Debug, Deserialize)]
pub struct AckParams {
    pub event_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SiteParams {
    pub site: Option<String>,
}

/// GET /
async fn root(State(state): State<Arc<ServerState>>) -> ApiResult<RootResponse> {
    let store = state.ingestor.store();
    let summary = store.summary().await.map_err(store_error)?;
    let db = std::fs::canonicalize(store.path())
        .unwrap_or_else(|_| store.path().to_path_buf())
        .display()
        .to_string();

    Ok(Json(RootResponse {
        ok: true,
        db,
        last: summary.last,
        count: summary.count,
    }))
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /sites
async fn sites(State(state): State<Arc<ServerState>>) -> ApiResult<Vec<String>> {
    let mut sites = state.ingestor.store().sites().await.map_err(store_error)?;
    if sites.is_empty() {
        sites.push(state.ingestor.default_site().to_string());
    }
    Ok(Json(sites))
}

/// POST /ingest
async fn ingest(
    State(state): State<Arc<ServerState>>,
    Json(reading): Json<ReadingIn>,
) -> ApiResult<IngestOutcome> {
    let outcome = state.ingestor.ingest(reading).await.map_err(store_error)?;
    Ok(Json(outcome))
}

/// GET /readings
async fn readings(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<ReadingsParams>,
) -> ApiResult<Vec<Reading>> {
    let window = match params.window.as_deref().filter(|w| !w.is_empty()) {
        Some(raw) => Some(parse_window(Some(raw), raw)?.duration()),
        None => None,
    };

    let rows = state
        .ingestor
        .store()
        .readings(ReadingQuery {
            limit: params.limit,
            site: site_filter(params.site),
            window,
        })
        .await
        .map_err(store_error)?;
    Ok(Json(rows))
}

/// GET /exposure
async fn exposure(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<WindowParams>,
) -> ApiResult<ExposureReport> {
    let window = parse_window(params.window.as_deref(), &state.default_window)?;
    let report = state
        .ingestor
        .exposure(&window, site_filter(params.site))
        .await
        .map_err(store_error)?;
    Ok(Json(report))
}

/// GET /stats
async fn stats(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<WindowParams>,
) -> ApiResult<StatsReport> {
    let window = parse_window(params.window.as_deref(), &state.default_window)?;
    let report = state
        .ingestor
        .stats(&window, site_filter(params.site))
        .await
        .map_err(store_error)?;
    Ok(Json(report))
}

/// POST /seed
async fn seed(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<SeedRequest>,
) -> ApiResult<SeedOutcome> {
    let outcome = state.ingestor.seed(request).await.map_err(|e| match e {
        IngestError::InvalidRequest(msg) => bad_request("INVALID_REQUEST", msg),
        IngestError::Store(e) => store_error(e),
    })?;
    Ok(Json(outcome))
}

/// GET /events
async fn events(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<EventsParams>,
) -> ApiResult<Vec<AlertEvent>> {
    let events = state
        .ingestor
        .store()
        .events(params.limit, site_filter(params.site))
        .await
        .map_err(store_error)?;
    Ok(Json(events))
}

/// POST /events/ack
async fn ack_event(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<AckParams>,
) -> ApiResult<serde_json::Value> {
    let found = state
        .ingestor
        .store()
        .acknowledge_event(params.event_id)
        .await
        .map_err(store_error)?;
    if !found {
        tracing::debug!("Acknowledge for unknown event {}", params.event_id);
    }
    Ok(Json(serde_json::json!({ "acknowledged": params.event_id })))
}

/// POST /reset
async fn reset(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<SiteParams>,
) -> ApiResult<serde_json::Value> {
    state
        .ingestor
        .store()
        .reset(site_filter(params.site))
        .await
        .map_err(store_error)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Build the application router.
pub fn router(ingestor: Ingestor, default_window: String) -> Router {
    let state = Arc::new(ServerState {
        ingestor,
        default_window,
    });

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/sites", get(sites))
        .route("/ingest", post(ingest))
        .route("/readings", get(readings))
        .route("/exposure", get(exposure))
        .route("/stats", get(stats))
        .route("/seed", post(seed))
        .route("/events", get(events))
        .route("/events/ack", post(ack_event))
        .route("/reset", post(reset))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    ingestor: Ingestor,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(ingestor, config.default_window.clone());

    let addr = SocketAddr::new(config.host, config.port);
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("IAQ server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
