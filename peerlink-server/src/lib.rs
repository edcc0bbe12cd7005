//! HTTP surface of PeerLink.
//!
//! Exposes peer management, the aggregated catalog, manual merges, and the
//! playback redirect under `/api/v1/federation`. Configuration writes are
//! gated by a [`ConfigMutationCapability`] while `admin_only_changes` is on.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
pub use infra::capability::{AdminTokenCapability, ConfigMutationCapability};
pub use infra::errors::{AppError, AppResult};

use axum::{
    Router,
    http::{Method, header},
    routing::get,
};
use peerlink_core::api_routes;
use peerlink_model::MergeTrigger;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Builds the full application router.
pub fn create_app(state: AppState) -> Router {
    let cors_layer = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route(api_routes::HEALTH, get(handlers::health::health_handler))
        .merge(routes::create_api_router(state.clone()))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the background merge machinery: a startup pass, the config watch,
/// and the periodic tick when one is configured.
pub fn start_background_merges(state: &AppState) {
    let scheduler = &state.scheduler;

    scheduler.submit(MergeTrigger::Startup);
    scheduler.watch_config_changes(state.federation.subscribe());

    match state.config.merge.refresh_interval {
        Some(interval) => {
            info!(interval = ?interval, "periodic merge enabled");
            scheduler.spawn_periodic(interval);
        }
        None => info!("periodic merge disabled"),
    }
}
