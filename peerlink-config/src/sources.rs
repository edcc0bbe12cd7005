use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use peerlink_model::PeerDescriptor;

use crate::util::{parse_bool_var, parse_path_var, parse_string_var};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub federation: FileFederationConfig,
    #[serde(default)]
    pub merge: FileMergeConfig,
    #[serde(default)]
    pub auth: FileAuthConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileFederationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_federation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_https: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_only_changes: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peers: Vec<PeerDescriptor>,
}

/// Durations are written in `humantime` form, e.g. `"15s"` or `"5m"`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileMergeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<String>,
    pub enable_federation: Option<bool>,
    pub client_mode: Option<bool>,
    pub require_https: Option<bool>,
    pub admin_token: Option<String>,
    pub peer_timeout: Option<String>,
    pub refresh_interval: Option<String>,
    pub state_path: Option<PathBuf>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: parse_path_var("PEERLINK_CONFIG"),
            server_host: parse_string_var("SERVER_HOST"),
            server_port: parse_string_var("SERVER_PORT"),
            enable_federation: parse_bool_var("PEERLINK_ENABLE_FEDERATION"),
            client_mode: parse_bool_var("PEERLINK_CLIENT_MODE"),
            require_https: parse_bool_var("PEERLINK_REQUIRE_HTTPS"),
            admin_token: parse_string_var("PEERLINK_ADMIN_TOKEN"),
            peer_timeout: parse_string_var("PEERLINK_PEER_TIMEOUT"),
            refresh_interval: parse_string_var("PEERLINK_REFRESH_INTERVAL"),
            state_path: parse_path_var("PEERLINK_STATE_PATH"),
        }
    }
}
