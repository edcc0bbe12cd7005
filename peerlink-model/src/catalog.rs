use std::fmt;

/// Display name used when a peer omits one.
pub const UNNAMED_ITEM: &str = "(unnamed)";

/// One entry of a peer's item listing. Only lives for a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RemoteCatalogItem {
    pub remote_id: String,
    pub display_name: String,
    pub media_kind: Option<String>,
}

impl RemoteCatalogItem {
    pub fn new(
        remote_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            remote_id: remote_id.into(),
            display_name: display_name.into(),
            media_kind: None,
        }
    }

    pub fn with_media_kind(mut self, kind: impl Into<String>) -> Self {
        self.media_kind = Some(kind.into());
        self
    }
}

/// Peer-qualified identity of an aggregated item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateKey {
    pub peer_address: String,
    pub remote_id: String,
}

impl AggregateKey {
    pub fn new(
        peer_address: impl Into<String>,
        remote_id: impl Into<String>,
    ) -> Self {
        Self {
            peer_address: peer_address.into(),
            remote_id: remote_id.into(),
        }
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.peer_address, self.remote_id)
    }
}

/// Merged, queryable representation of a remote item.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AggregateEntry {
    pub peer_address: String,
    pub remote_id: String,
    pub display_name: String,
    pub media_kind: Option<String>,
}

impl AggregateEntry {
    pub fn from_remote(peer_address: &str, item: RemoteCatalogItem) -> Self {
        Self {
            peer_address: peer_address.to_string(),
            remote_id: item.remote_id,
            display_name: item.display_name,
            media_kind: item.media_kind,
        }
    }

    pub fn key(&self) -> AggregateKey {
        AggregateKey::new(&self.peer_address, &self.remote_id)
    }
}
