//! HTTP server.
//!
//! Builds the axum application: the JSON API under `/api` (see [`crate::api`]),
//! uploaded files under `/storage`, `/health`, and optionally the compiled
//! frontend with an `index.html` fallback for client-side routes.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use crate::api;
use crate::config::Config;
use crate::db;
use crate::llm::{create_model, ChatModel};
use crate::storage::PUBLIC_PREFIX;

/// Headroom above the PDF size limit for the other multipart fields.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Shared state handed to every handler.
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub model: Arc<dyn ChatModel>,
}

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`
/// filter; `LEGISCI_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LEGISCI_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // A subscriber may already be installed (tests, embedding binaries).
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Opens the database and instantiates the configured model.
pub async fn build_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let pool = db::connect(&config).await?;
    let model = create_model(&config.llm)?;
    Ok(Arc::new(AppState {
        pool,
        config: Arc::new(config),
        model,
    }))
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.storage.max_pdf_bytes + BODY_LIMIT_SLACK;

    let storage = ServeDir::new(&state.config.storage.root);
    let mut router = Router::new()
        .nest("/api", api::router(state.clone()))
        .route("/health", get(handle_health))
        .nest_service(PUBLIC_PREFIX.trim_end_matches('/'), storage);

    if let Some(dir) = state.config.server.static_dir.as_ref() {
        let spa = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
        router = router.fallback_service(spa);
    }

    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serves until the process is terminated.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = build_state(config).await?;
    tracing::info!(
        model = state.model.model_name(),
        storage = %state.config.storage.root.display(),
        "starting server"
    );

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("LegisCI listening on http://{}", bind_addr);
    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
