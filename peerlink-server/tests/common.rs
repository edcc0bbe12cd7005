use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum_test::TestServer;
use parking_lot::Mutex;
use peerlink_config::{
    AdminToken, AuthConfig, Config, ConfigMetadata, FederationSettings,
    MergeSettings, ServerConfig,
};
use peerlink_core::{PeerCatalogSource, PeerError};
use peerlink_model::{
    FederationPolicy, PeerDescriptor, ProbeResult, RemoteCatalogItem,
};
use peerlink_server::{
    AdminTokenCapability, AppState, ConfigMutationCapability, create_app,
};

#[allow(unused)]
pub const ADMIN_TOKEN: &str = "test-admin-token";

#[allow(unused)]
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Catalogs served per stored peer address. Unknown peers answer HTTP 500.
#[allow(unused)]
#[derive(Default)]
pub struct CannedPeers {
    catalogs: Mutex<HashMap<String, Vec<RemoteCatalogItem>>>,
    probed: Mutex<Vec<String>>,
}

#[allow(unused)]
impl CannedPeers {
    pub fn with(self, address: &str, items: Vec<RemoteCatalogItem>) -> Self {
        self.catalogs.lock().insert(address.to_string(), items);
        self
    }

    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().clone()
    }
}

#[async_trait]
impl PeerCatalogSource for CannedPeers {
    async fn probe(
        &self,
        peer: &PeerDescriptor,
        require_https: bool,
    ) -> ProbeResult {
        self.probed.lock().push(peer.base_address.clone());
        if let Err(err) =
            peerlink_core::normalize(&peer.base_address, require_https)
        {
            return ProbeResult::unreachable(err.to_string());
        }
        if self.catalogs.lock().contains_key(&peer.base_address) {
            ProbeResult {
                reachable: true,
                status_summary: "Connected".to_string(),
                body_preview: "{\"ServerName\":\"canned\"}".to_string(),
            }
        } else {
            ProbeResult::unreachable("Connection failed")
        }
    }

    async fn fetch_catalog(
        &self,
        peer: &PeerDescriptor,
        _require_https: bool,
    ) -> Result<Vec<RemoteCatalogItem>, PeerError> {
        self.catalogs
            .lock()
            .get(&peer.base_address)
            .cloned()
            .ok_or(PeerError::Status {
                code: 500,
                reason: "Internal Server Error".to_string(),
            })
    }
}

#[allow(unused)]
pub fn test_config(policy: FederationPolicy, peers: Vec<PeerDescriptor>) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        federation: FederationSettings { policy, peers },
        merge: MergeSettings {
            pass_deadline: Duration::from_secs(10),
            ..MergeSettings::default()
        },
        auth: AuthConfig {
            admin_token: AdminToken::new(ADMIN_TOKEN),
        },
        state_path: None,
        metadata: ConfigMetadata::default(),
    }
}

#[allow(unused)]
pub fn open_policy() -> FederationPolicy {
    FederationPolicy {
        require_https: false,
        admin_only_changes: false,
        ..FederationPolicy::default()
    }
}

#[allow(unused)]
pub fn build_state(config: Config, peers: Arc<CannedPeers>) -> AppState {
    let capability: Arc<dyn ConfigMutationCapability> = Arc::new(
        AdminTokenCapability::new(config.auth.admin_token.clone()),
    );
    AppState::with_parts(config, peers as Arc<dyn PeerCatalogSource>, capability)
}

#[allow(unused)]
pub fn test_server(state: AppState) -> anyhow::Result<TestServer> {
    TestServer::new(create_app(state))
        .map_err(|err| anyhow::anyhow!(err.to_string()))
}

#[allow(unused)]
pub fn state_file(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("federation-state.toml")
}
