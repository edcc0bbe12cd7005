//! # PeerLink Core
//!
//! Federation engine for PeerLink: talks to peer media servers, folds their
//! catalogs into one aggregate view and resolves playback back to the peer
//! that owns an item.
//!
//! ## Architecture
//!
//! - [`url_policy`]: canonical form of peer addresses and the HTTPS policy
//! - [`peer`]: the [`peer::PeerCatalogSource`] seam and its `reqwest` client
//! - [`aggregate`]: the in-memory aggregate store
//! - [`merge`]: single-flight merge passes and the trigger scheduler
//! - [`playback`]: stream address construction
//! - [`api_routes`]: versioned HTTP route constants
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use peerlink_core::{
//!     aggregate::AggregateStore,
//!     merge::{MergeConfig, MergeCoordinator},
//!     peer::{HttpPeerClient, PeerClientConfig},
//! };
//! use peerlink_model::{
//!     FederationPolicy, FederationSnapshot, MergeTrigger, PeerDescriptor,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpPeerClient::new(PeerClientConfig::default())?;
//! let coordinator = MergeCoordinator::new(
//!     Arc::new(client),
//!     Arc::new(AggregateStore::new()),
//!     MergeConfig::default(),
//! );
//!
//! let snapshot = FederationSnapshot::new(
//!     FederationPolicy::default(),
//!     vec![PeerDescriptor::new("https://peer.example:8920", "api-key")],
//! );
//! let outcome = coordinator
//!     .run_merge_pass(snapshot, MergeTrigger::ManualRefresh, &CancellationToken::new())
//!     .await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Versioned HTTP routes shared by the server and its clients
pub mod api_routes;

pub mod aggregate;
pub mod error;
pub mod merge;
pub mod peer;
pub mod playback;
pub mod url_policy;

pub use aggregate::AggregateStore;
pub use error::{AddressError, MergeError, PeerError};
pub use merge::{
    FederationSnapshotSource, MergeConfig, MergeCoordinator, MergeHandle,
    MergeScheduler,
};
pub use peer::{HttpPeerClient, PeerCatalogSource, PeerClientConfig};
pub use playback::build_stream_address;
pub use url_policy::{NormalizedPeerAddress, normalize};
