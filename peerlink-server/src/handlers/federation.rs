//! Peer management, merge control, and the aggregated catalog.

use axum::{Json, extract::State, http::HeaderMap};
use peerlink_model::{
    AddPeerRequest, AggregateResponse, ApiResponse, FederationPolicy,
    MergeOutcome, MergeTrigger, PeerDescriptor, PeerSummary, PeersResponse,
    ProbeResult, RemovePeerRequest, StatusResponse, TestConnectionRequest,
    UpdateModesRequest,
};
use tracing::info;

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

fn summaries(peers: &[PeerDescriptor]) -> Vec<PeerSummary> {
    peers.iter().map(PeerSummary::from).collect()
}

pub async fn status_handler(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<StatusResponse>>> {
    let settings = state.federation.settings();
    let peers = summaries(&settings.peers);

    Ok(Json(ApiResponse::success(StatusResponse {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        policy: settings.policy,
        peer_count: peers.len(),
        peers,
        aggregate_count: state.aggregate().len(),
        merge_running: state.coordinator.is_running(),
        last_merge: state.coordinator.last_report(),
    })))
}

pub async fn list_peers_handler(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<PeersResponse>>> {
    let peers = summaries(&state.federation.peers());
    Ok(Json(ApiResponse::success(PeersResponse {
        count: peers.len(),
        peers,
    })))
}

/// Adds a peer. The store's change notification schedules a merge.
pub async fn add_peer_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AddPeerRequest>,
) -> AppResult<Json<ApiResponse<PeerSummary>>> {
    state.authorize_config_write(&headers)?;

    if request.address.trim().is_empty() {
        return Err(AppError::bad_request("Peer address is required"));
    }

    let mut peer = PeerDescriptor::new(request.address, request.credential);
    if let Some(port) = request.port {
        peer = peer.with_port(port);
    }

    let stored = state.federation.add_peer(peer)?;
    let total = state.federation.peers().len();
    info!(peer = %stored.base_address, total, "peer added via API");

    Ok(Json(
        ApiResponse::success(PeerSummary::from(&stored))
            .with_message(format!("Peer added; {total} configured")),
    ))
}

pub async fn remove_peer_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RemovePeerRequest>,
) -> AppResult<Json<ApiResponse<PeerSummary>>> {
    state.authorize_config_write(&headers)?;

    let removed = state.federation.remove_peer(&request.address)?;
    let remaining = state.federation.peers().len();
    info!(peer = %removed.base_address, remaining, "peer removed via API");

    Ok(Json(
        ApiResponse::success(PeerSummary::from(&removed))
            .with_message(format!("Peer removed; {remaining} remaining")),
    ))
}

pub async fn update_modes_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateModesRequest>,
) -> AppResult<Json<ApiResponse<FederationPolicy>>> {
    state.authorize_config_write(&headers)?;

    let policy = state
        .federation
        .update_policy(|policy| request.apply_to(policy))?;
    Ok(Json(ApiResponse::success(policy)))
}

/// Runs a merge pass and answers once it has finished.
pub async fn refresh_handler(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<MergeOutcome>>> {
    let outcome = state
        .scheduler
        .submit(MergeTrigger::ManualRefresh)
        .outcome()
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn aggregate_handler(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<AggregateResponse>>> {
    let items = state.aggregate().snapshot();
    Ok(Json(ApiResponse::success(AggregateResponse {
        count: items.len(),
        items,
    })))
}

/// Probes an address without adding it. Failures are reported in the body.
pub async fn test_peer_handler(
    State(state): State<AppState>,
    Json(request): Json<TestConnectionRequest>,
) -> AppResult<Json<ApiResponse<ProbeResult>>> {
    let peer = PeerDescriptor::new(
        request.address,
        request.credential.unwrap_or_default(),
    );
    let require_https = state.federation.policy().require_https;

    let result = state.peer_client.probe(&peer, require_https).await;
    Ok(Json(ApiResponse::success(result)))
}
