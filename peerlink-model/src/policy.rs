use crate::peer::PeerDescriptor;

/// Feature toggles governing federation behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct FederationPolicy {
    /// Master switch.
    pub enable_federation: bool,
    /// Consume catalogs from peers.
    pub client_mode: bool,
    /// Share this server's catalog with peers. Informational here.
    pub server_mode: bool,
    pub require_https: bool,
    pub admin_only_changes: bool,
}

impl Default for FederationPolicy {
    fn default() -> Self {
        Self {
            enable_federation: true,
            client_mode: true,
            server_mode: true,
            require_https: true,
            admin_only_changes: true,
        }
    }
}

/// Point-in-time view of the configuration a merge pass works from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FederationSnapshot {
    pub policy: FederationPolicy,
    pub peers: Vec<PeerDescriptor>,
}

impl FederationSnapshot {
    pub fn new(policy: FederationPolicy, peers: Vec<PeerDescriptor>) -> Self {
        Self { policy, peers }
    }
}
