//! HTTP surface for the storage path
//!
//! Thin axum layer over the ingestion and retrieval services, plus the
//! test-seed endpoint that writes backdated records straight into the fast
//! tier so sweeper behavior can be exercised without waiting on wall-clock
//! aging.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::error::{Result, StrataError};
use crate::service::types::INGESTION_TS_FIELD;
use crate::service::{IngestRequest, IngestionService, RetrievalService};
use crate::tier::FastTier;

/// TTL applied to seeded test records
const SEED_TTL: Duration = Duration::from_secs(600);
/// How far in the past seeded records are stamped
const SEED_BACKDATE_SECS: i64 = 120;
const SEED_MAX_COUNT: usize = 500;

/// Shared application state for all handlers
pub struct AppState {
    pub ingestion: IngestionService,
    pub retrieval: RetrievalService,
    /// Direct tier access for the test-seed endpoint
    pub fast: Arc<dyn FastTier>,
}

/// The daemon's HTTP server
pub struct HttpServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Bind and serve until ctrl-c or SIGTERM
    pub async fn serve(&self) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|e| StrataError::Config(format!("invalid listen address: {e}")))?;

        let app = create_router(
            self.state.clone(),
            Duration::from_secs(self.config.request_timeout_secs),
        );

        tracing::info!("listening on {addr}");
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| StrataError::Startup(format!("failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| StrataError::Startup(format!("server error: {e}")))?;

        tracing::info!("server shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ingest", axum::routing::post(ingest_handler))
        .route("/get/{*key}", get(retrieve_handler))
        .route("/seed-old-keys", get(seed_handler).post(seed_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn ingest_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> Response {
    match state.ingestion.ingest(request).await {
        Ok(outcome) => Json(json!({
            "ok": true,
            "stored": outcome.stored,
            "pressure_ratio": outcome.pressure_ratio,
            "error": outcome.error,
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e),
    }
}

async fn retrieve_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Response {
    match state.retrieval.retrieve(&key).await {
        Ok(found) => Json(json!({
            "ok": true,
            "source": found.source,
            "value": found.value,
        }))
        .into_response(),
        Err(e @ StrataError::NotFound(_)) => error_response(StatusCode::NOT_FOUND, &e),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct SeedQuery {
    pub count: Option<usize>,
}

/// Write `count` synthetic records with a backdated embedded timestamp,
/// making them immediately eligible for the next sweep run.
async fn seed_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SeedQuery>,
) -> Response {
    let count = query.count.unwrap_or(20).clamp(1, SEED_MAX_COUNT);
    let backdated = chrono::Utc::now().timestamp() - SEED_BACKDATE_SECS;

    let mut seeded = 0;
    for i in 0..count {
        let payload = json!({
            INGESTION_TS_FIELD: backdated,
            "seed": true,
            "i": i,
        });
        let bytes = match serde_json::to_vec(&payload) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };
        match state
            .fast
            .set_with_ttl(&format!("seed:old:{i}"), bytes, SEED_TTL)
            .await
        {
            Ok(()) => seeded += 1,
            Err(e) => tracing::warn!("seed write {i} failed: {e}"),
        }
    }

    Json(json!({
        "ok": true,
        "seeded": seeded,
        "message": "keys written with a backdated timestamp; the next sweep run will move them",
    }))
    .into_response()
}

fn error_response(status: StatusCode, error: &StrataError) -> Response {
    (
        status,
        Json(json!({
            "ok": false,
            "error": error.to_string(),
        })),
    )
        .into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
