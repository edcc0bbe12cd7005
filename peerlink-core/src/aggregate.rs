use std::{collections::HashMap, fmt};

use parking_lot::RwLock;
use peerlink_model::{AggregateEntry, AggregateKey};

/// Last known merged catalog.
///
/// One lock guards the whole map, so a reader never sees half of a
/// `clear()`: a snapshot is either entirely before or entirely after it.
/// Only the merge coordinator writes; everything else reads snapshots.
#[derive(Default)]
pub struct AggregateStore {
    entries: RwLock<HashMap<AggregateKey, AggregateEntry>>,
}

impl fmt::Debug for AggregateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateStore")
            .field("entries", &self.len())
            .finish()
    }
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Insert-or-overwrite; the last writer for a key wins.
    pub fn put(&self, key: AggregateKey, entry: AggregateEntry) {
        self.entries.write().insert(key, entry);
    }

    pub fn get(&self, key: &AggregateKey) -> Option<AggregateEntry> {
        self.entries.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Owned point-in-time copy, ordered by peer, name, then id.
    pub fn snapshot(&self) -> Vec<AggregateEntry> {
        let mut entries: Vec<AggregateEntry> =
            self.entries.read().values().cloned().collect();
        entries.sort_by(|a, b| {
            a.peer_address
                .cmp(&b.peer_address)
                .then_with(|| a.display_name.cmp(&b.display_name))
                .then_with(|| a.remote_id.cmp(&b.remote_id))
        });
        entries
    }
}
