//! Merge passes: folding every peer's catalog into the aggregate store.

mod coordinator;
pub mod scheduler;

pub use coordinator::{
    DEFAULT_FETCH_CONCURRENCY, DEFAULT_PASS_DEADLINE, MergeConfig,
    MergeCoordinator,
};
pub use scheduler::{MergeHandle, MergeScheduler};

use peerlink_model::FederationSnapshot;

/// Supplies the configuration a merge pass works from.
///
/// Read once per pass, after the single-flight gate is held, so a trigger
/// that waited on the gate still sees the latest peers.
pub trait FederationSnapshotSource: Send + Sync {
    fn federation_snapshot(&self) -> FederationSnapshot;
}

impl FederationSnapshotSource for FederationSnapshot {
    fn federation_snapshot(&self) -> FederationSnapshot {
        self.clone()
    }
}

impl FederationSnapshotSource for parking_lot::RwLock<FederationSnapshot> {
    fn federation_snapshot(&self) -> FederationSnapshot {
        self.read().clone()
    }
}
