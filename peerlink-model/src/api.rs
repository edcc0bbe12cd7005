//! Request and response payloads exchanged over the federation HTTP surface.

use crate::catalog::AggregateEntry;
use crate::merge::MergeReport;
use crate::peer::PeerDescriptor;
use crate::policy::FederationPolicy;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApiResponse<T> {
    pub status: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub data: Option<T>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub error: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn with_message(mut self, message: String) -> Self {
        self.message = Some(message);
        self
    }
}

/// Result of a connectivity probe against one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProbeResult {
    pub reachable: bool,
    pub status_summary: String,
    pub body_preview: String,
}

impl ProbeResult {
    pub fn unreachable(status_summary: impl Into<String>) -> Self {
        Self {
            reachable: false,
            status_summary: status_summary.into(),
            body_preview: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddPeerRequest {
    #[cfg_attr(feature = "serde", serde(alias = "server_url"))]
    pub address: String,
    #[cfg_attr(feature = "serde", serde(default, alias = "api_key"))]
    pub credential: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub port: Option<u16>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RemovePeerRequest {
    #[cfg_attr(feature = "serde", serde(alias = "server_url"))]
    pub address: String,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TestConnectionRequest {
    #[cfg_attr(feature = "serde", serde(alias = "server_url"))]
    pub address: String,
    #[cfg_attr(feature = "serde", serde(default, alias = "api_key"))]
    pub credential: Option<String>,
}

/// Partial policy update; omitted flags keep their current value.
#[derive(Debug, Clone, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct UpdateModesRequest {
    pub enable_federation: Option<bool>,
    pub client_mode: Option<bool>,
    pub server_mode: Option<bool>,
    pub require_https: Option<bool>,
    pub admin_only_changes: Option<bool>,
}

impl UpdateModesRequest {
    pub fn apply_to(&self, policy: &mut FederationPolicy) {
        if let Some(value) = self.enable_federation {
            policy.enable_federation = value;
        }
        if let Some(value) = self.client_mode {
            policy.client_mode = value;
        }
        if let Some(value) = self.server_mode {
            policy.server_mode = value;
        }
        if let Some(value) = self.require_https {
            policy.require_https = value;
        }
        if let Some(value) = self.admin_only_changes {
            policy.admin_only_changes = value;
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolvePlaybackRequest {
    #[cfg_attr(feature = "serde", serde(alias = "server_url"))]
    pub peer_address: String,
    #[cfg_attr(feature = "serde", serde(alias = "id"))]
    pub remote_item_id: String,
}

/// Query string of the redirecting stream endpoint.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamQuery {
    #[cfg_attr(
        feature = "serde",
        serde(rename = "serverUrl", alias = "server_url", default)
    )]
    pub server_url: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlaybackTarget {
    pub target: String,
}

/// Operator-facing view of a configured peer. Never carries the token.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerSummary {
    pub address: String,
    pub port: u16,
    pub has_credential: bool,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub credential_preview: Option<String>,
}

impl From<&PeerDescriptor> for PeerSummary {
    fn from(peer: &PeerDescriptor) -> Self {
        Self {
            address: peer.base_address.clone(),
            port: peer.port,
            has_credential: !peer.credential.is_blank(),
            credential_preview: peer.credential.preview(),
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeersResponse {
    pub count: usize,
    pub peers: Vec<PeerSummary>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AggregateResponse {
    pub count: usize,
    pub items: Vec<AggregateEntry>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusResponse {
    pub service: String,
    pub version: String,
    pub policy: FederationPolicy,
    pub peer_count: usize,
    pub peers: Vec<PeerSummary>,
    pub aggregate_count: usize,
    pub merge_running: bool,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub last_merge: Option<MergeReport>,
}
