use std::collections::HashSet;

use peerlink_core::url_policy::{normalize, violates_https_policy};

use super::models::Config;

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

/// Non-fatal checks on a composed configuration.
pub fn apply_guard_rails(config: &Config) -> ConfigWarnings {
    let mut warnings = ConfigWarnings::default();
    let policy = &config.federation.policy;

    if policy.admin_only_changes && config.auth.admin_token.is_none() {
        warnings.push_with_hint(
            "admin_only_changes is enabled but no admin token is configured; configuration writes will be refused",
            "Set PEERLINK_ADMIN_TOKEN or auth.admin_token",
        );
    }

    if !policy.enable_federation {
        warnings.push("Federation is disabled; merge passes will be skipped");
    } else if !policy.client_mode {
        warnings.push("Client mode is disabled; peer catalogs will not be merged");
    }

    let mut seen = HashSet::new();
    for peer in &config.federation.peers {
        let address = peer.base_address.trim();
        match normalize(address, false) {
            Ok(normalized) => {
                if !seen.insert(normalized.as_str().to_ascii_lowercase()) {
                    warnings.push(format!(
                        "Peer {normalized} is configured more than once"
                    ));
                }
            }
            Err(err) => {
                warnings.push(format!("Peer '{address}' is unusable: {err}"));
                continue;
            }
        }

        if violates_https_policy(address, policy.require_https) {
            warnings.push_with_hint(
                format!("Peer '{address}' is not HTTPS and will be skipped while require_https is on"),
                "Use an https:// address or set PEERLINK_REQUIRE_HTTPS=false",
            );
        }
    }

    warnings
}
