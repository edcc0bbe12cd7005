use std::{fmt, path::PathBuf, time::Duration};

use peerlink_core::{MergeConfig, PeerClientConfig};
use peerlink_model::{FederationPolicy, FederationSnapshot, PeerDescriptor};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub federation: FederationSettings,
    pub merge: MergeSettings,
    pub auth: AuthConfig,
    /// Where accepted configuration writes are persisted. `None` keeps them
    /// in memory only.
    pub state_path: Option<PathBuf>,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Mutable federation settings: policy flags plus the peer list.
///
/// This is also the on-disk shape of the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationSettings {
    #[serde(default)]
    pub policy: FederationPolicy,
    #[serde(default)]
    pub peers: Vec<PeerDescriptor>,
}

impl FederationSettings {
    pub fn snapshot(&self) -> FederationSnapshot {
        FederationSnapshot::new(self.policy, self.peers.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSettings {
    pub peer_timeout: Duration,
    pub fetch_concurrency: usize,
    pub pass_deadline: Duration,
    /// Periodic refresh; `None` disables the scheduled tick.
    pub refresh_interval: Option<Duration>,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            peer_timeout: peerlink_core::peer::DEFAULT_REQUEST_TIMEOUT,
            fetch_concurrency: peerlink_core::merge::DEFAULT_FETCH_CONCURRENCY,
            pass_deadline: peerlink_core::merge::DEFAULT_PASS_DEADLINE,
            refresh_interval: None,
        }
    }
}

impl MergeSettings {
    pub fn merge_config(&self) -> MergeConfig {
        MergeConfig {
            fetch_concurrency: self.fetch_concurrency,
            pass_deadline: self.pass_deadline,
        }
    }

    pub fn peer_client_config(&self) -> PeerClientConfig {
        PeerClientConfig {
            request_timeout: self.peer_timeout,
        }
    }
}

/// Bearer token that unlocks configuration writes.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AdminToken(String);

impl AdminToken {
    /// Returns `None` for blank input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminToken(<redacted>)")
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub admin_token: Option<AdminToken>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
    /// True when the federation section came from the state file.
    pub state_loaded: bool,
}
