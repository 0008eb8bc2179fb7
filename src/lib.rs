pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod middleware;
pub mod models;
pub mod resource;
pub mod schemas;
pub mod security;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::authentication_middleware;
use crate::models::ALL_MODELS;
use crate::resource::ApiManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseManager,
    pub api: Arc<ApiManager>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Connect the database, create missing tables and register the APIs
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let db = DatabaseManager::connect(&config.database).await?;
        db.initialize(&ALL_MODELS).await?;
        let api = api::manager()?;

        Ok(Self {
            db,
            api: Arc::new(api),
            config: Arc::new(config),
        })
    }
}

pub fn app(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Versioned resources
        .merge(state.api.router(&config.api.prefix))
        .layer(from_fn_with_state(state.clone(), authentication_middleware))
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));

    if config.security.enable_cors {
        router = router.layer(cors_layer(&config.security.cors_origins));
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    info!("Mounted API under {}", config.api.prefix);
    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    let versions: Vec<Value> = state
        .api
        .versions()
        .iter()
        .map(|v| json!({ "name": v.name, "path": v.prefix(&state.config.api.prefix) }))
        .collect();

    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "versions": versions,
    }))
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::service_unavailable("Database is not reachable")
    })?;
    Ok(Json(json!({ "status": "ok" })))
}
