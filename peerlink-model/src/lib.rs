//! Core data model definitions shared across PeerLink crates.
#![allow(missing_docs)]

pub mod api;
pub mod catalog;
pub mod merge;
pub mod peer;
pub mod policy;

// Intentionally curated re-exports for downstream consumers.
pub use api::{
    AddPeerRequest, AggregateResponse, ApiResponse, PeerSummary,
    PeersResponse, PlaybackTarget, ProbeResult, RemovePeerRequest,
    ResolvePlaybackRequest, StatusResponse, StreamQuery,
    TestConnectionRequest, UpdateModesRequest,
};
pub use catalog::{AggregateEntry, AggregateKey, RemoteCatalogItem};
pub use merge::{
    CancelReason, MergeOutcome, MergeReport, MergeTrigger, PeerMergeReport,
    SkipReason,
};
pub use peer::{DEFAULT_PEER_PORT, PeerCredential, PeerDescriptor};
pub use policy::{FederationPolicy, FederationSnapshot};
