//! Outbound calls to federated peers.

mod client;
pub mod listing;

pub use client::{
    COMPAT_TOKEN_HEADER, DEFAULT_REQUEST_TIMEOUT, HttpPeerClient,
    ITEMS_PATH, PREVIEW_CHARS, PeerClientConfig, SYSTEM_INFO_PATH,
};
pub use listing::{CatalogListing, parse_catalog};

use async_trait::async_trait;
use peerlink_model::{PeerDescriptor, ProbeResult, RemoteCatalogItem};

use crate::error::PeerError;

/// Source of peer catalogs.
///
/// [`HttpPeerClient`] is the production implementation; the merge coordinator
/// only depends on this trait.
#[async_trait]
pub trait PeerCatalogSource: Send + Sync {
    /// Bounded-time connectivity check. Never fails; problems are reported
    /// through `reachable = false` and the status summary.
    async fn probe(&self, peer: &PeerDescriptor, require_https: bool)
    -> ProbeResult;

    /// Fetches the peer's item listing.
    async fn fetch_catalog(
        &self,
        peer: &PeerDescriptor,
        require_https: bool,
    ) -> Result<Vec<RemoteCatalogItem>, PeerError>;
}
