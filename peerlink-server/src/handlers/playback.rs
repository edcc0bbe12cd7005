use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use peerlink_core::{
    build_stream_address, normalize, url_policy::violates_https_policy,
};
use peerlink_model::{
    ApiResponse, PlaybackTarget, ResolvePlaybackRequest, StreamQuery,
};
use tracing::debug;

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

/// Checks the caller-supplied peer address against the live policy and builds
/// the stream address. The address is not required to be a configured peer.
fn resolve_target(
    state: &AppState,
    peer_address: &str,
    remote_item_id: &str,
) -> AppResult<String> {
    if peer_address.trim().is_empty() || remote_item_id.trim().is_empty() {
        return Err(AppError::bad_request(
            "Peer address and item id are required",
        ));
    }

    let require_https = state.federation.policy().require_https;
    if violates_https_policy(peer_address.trim(), require_https) {
        return Err(AppError::bad_request("HTTPS required by configuration"));
    }

    // Scheme-less bases get the stored-peer `http://` default; the
    // `Location` must stay absolute.
    let peer_address = peer_address.trim();
    if peer_address.contains("://") {
        Ok(build_stream_address(peer_address, remote_item_id))
    } else {
        let base = normalize(peer_address, false)?;
        Ok(build_stream_address(base.as_str(), remote_item_id))
    }
}

pub async fn resolve_playback_handler(
    State(state): State<AppState>,
    Json(request): Json<ResolvePlaybackRequest>,
) -> AppResult<Json<ApiResponse<PlaybackTarget>>> {
    let target =
        resolve_target(&state, &request.peer_address, &request.remote_item_id)?;
    Ok(Json(ApiResponse::success(PlaybackTarget { target })))
}

/// Redirects the player to the owning peer with `302 Found`.
pub async fn stream_redirect_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> AppResult<Response> {
    let target = resolve_target(&state, &query.server_url, &query.id)?;
    let location = HeaderValue::from_str(&target)
        .map_err(|_| AppError::bad_request("Stream address is not a valid URL"))?;

    debug!(target = %target, "redirecting playback to peer");
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}
