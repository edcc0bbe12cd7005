use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

pub const DEFAULT_PEER_PORT: u16 = 8096;

const CREDENTIAL_PREVIEW_LEN: usize = 8;

/// Access token presented to a peer.
///
/// The token never appears in `Debug` output and is wiped from memory when
/// dropped. Read APIs only ever expose [`PeerCredential::preview`].
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "String", into = "String")
)]
pub struct PeerCredential(String);

impl PeerCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    /// Raw token, for building outbound request headers only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Short, non-reversible hint suitable for operator-facing listings.
    pub fn preview(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        if self.0.chars().count() > CREDENTIAL_PREVIEW_LEN {
            let head: String =
                self.0.chars().take(CREDENTIAL_PREVIEW_LEN).collect();
            Some(format!("{head}..."))
        } else {
            Some("***".to_string())
        }
    }
}

impl fmt::Debug for PeerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PeerCredential").field(&"<redacted>").finish()
    }
}

impl From<&str> for PeerCredential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PeerCredential {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<PeerCredential> for String {
    fn from(credential: PeerCredential) -> Self {
        credential.0.clone()
    }
}

/// Configuration-supplied identity of a federated server.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerDescriptor {
    /// Root URL as configured; may be scheme-less.
    #[cfg_attr(feature = "serde", serde(alias = "server_url"))]
    pub base_address: String,
    #[cfg_attr(feature = "serde", serde(default, alias = "api_key"))]
    pub credential: PeerCredential,
    /// Informational only. The effective port lives in `base_address`.
    #[cfg_attr(feature = "serde", serde(default = "default_peer_port"))]
    pub port: u16,
}

#[cfg(feature = "serde")]
fn default_peer_port() -> u16 {
    DEFAULT_PEER_PORT
}

impl PeerDescriptor {
    pub fn new(
        base_address: impl Into<String>,
        credential: impl Into<PeerCredential>,
    ) -> Self {
        Self {
            base_address: base_address.into(),
            credential: credential.into(),
            port: DEFAULT_PEER_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}
