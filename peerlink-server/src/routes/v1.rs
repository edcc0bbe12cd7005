use axum::{
    Router,
    routing::{get, post, put},
};

use crate::{
    AppState,
    handlers::{federation, playback},
};

/// Create all v1 API routes
pub fn create_v1_router(_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/federation/status", get(federation::status_handler))
        .route(
            "/federation/peers",
            get(federation::list_peers_handler)
                .post(federation::add_peer_handler)
                .delete(federation::remove_peer_handler),
        )
        .route("/federation/peers/test", post(federation::test_peer_handler))
        .route("/federation/modes", put(federation::update_modes_handler))
        .route("/federation/refresh", post(federation::refresh_handler))
        .route("/federation/aggregate", get(federation::aggregate_handler))
        .route(
            "/federation/playback/resolve",
            post(playback::resolve_playback_handler),
        )
        .route("/federation/stream", get(playback::stream_redirect_handler))
}
