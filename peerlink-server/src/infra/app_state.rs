use std::{fmt, sync::Arc};

use anyhow::Context;
use axum::http::HeaderMap;
use peerlink_config::{Config, FederationConfigStore};
use peerlink_core::{
    AggregateStore, FederationSnapshotSource, HttpPeerClient, MergeCoordinator,
    MergeScheduler, PeerCatalogSource,
};

use crate::infra::{
    capability::{AdminTokenCapability, ConfigMutationCapability},
    errors::{AppError, AppResult},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Live federation settings. `config.federation` is only the startup value.
    pub federation: Arc<FederationConfigStore>,
    pub coordinator: Arc<MergeCoordinator>,
    pub scheduler: MergeScheduler,
    pub peer_client: Arc<dyn PeerCatalogSource>,
    pub capability: Arc<dyn ConfigMutationCapability>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("federation", &self.federation)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wires the production collaborators from a loaded configuration.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let peer_client = HttpPeerClient::new(config.merge.peer_client_config())
            .context("failed to build peer HTTP client")?;
        let capability = AdminTokenCapability::new(config.auth.admin_token.clone());
        Ok(Self::with_parts(config, Arc::new(peer_client), Arc::new(capability)))
    }

    pub fn with_parts(
        config: Config,
        peer_client: Arc<dyn PeerCatalogSource>,
        capability: Arc<dyn ConfigMutationCapability>,
    ) -> Self {
        let federation = Arc::new(FederationConfigStore::new(
            config.federation.clone(),
            config.state_path.clone(),
        ));
        let coordinator = Arc::new(MergeCoordinator::new(
            Arc::clone(&peer_client),
            Arc::new(AggregateStore::new()),
            config.merge.merge_config(),
        ));
        let scheduler = MergeScheduler::new(
            Arc::clone(&coordinator),
            Arc::clone(&federation) as Arc<dyn FederationSnapshotSource>,
        );

        Self {
            config: Arc::new(config),
            federation,
            coordinator,
            scheduler,
            peer_client,
            capability,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn aggregate(&self) -> &Arc<AggregateStore> {
        self.coordinator.store()
    }

    /// Refuses a configuration write unless the policy allows everyone or
    /// the caller holds the capability.
    pub fn authorize_config_write(&self, headers: &HeaderMap) -> AppResult<()> {
        if !self.federation.policy().admin_only_changes {
            return Ok(());
        }
        if self.capability.caller_may_mutate_config(headers) {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "Configuration changes require an admin token",
            ))
        }
    }
}
