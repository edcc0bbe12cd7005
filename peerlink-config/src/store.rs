//! Live federation settings.
//!
//! Handlers mutate peers and policy flags through [`FederationConfigStore`];
//! every accepted write is persisted (when a state path is configured) and
//! then announced on a `watch` channel so the merge scheduler can react.

use std::{
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
};

use parking_lot::RwLock;
use peerlink_core::{
    AddressError, FederationSnapshotSource,
    url_policy::{normalize, trim_trailing_slash},
};
use peerlink_model::{FederationPolicy, FederationSnapshot, PeerDescriptor};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{loader::ConfigLoadError, models::FederationSettings};

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("Peer {0} is already configured")]
    DuplicatePeer(String),

    #[error("Peer {0} is not configured")]
    PeerNotFound(String),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("failed to persist federation state to {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct FederationConfigStore {
    settings: RwLock<FederationSettings>,
    state_path: Option<PathBuf>,
    revision: watch::Sender<u64>,
}

impl fmt::Debug for FederationConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = self.settings.read();
        f.debug_struct("FederationConfigStore")
            .field("policy", &settings.policy)
            .field("peers", &settings.peers.len())
            .field("state_path", &self.state_path)
            .field("revision", &*self.revision.borrow())
            .finish()
    }
}

/// Lowercased canonical form used for duplicate detection.
fn identity(address: &str) -> String {
    let canonical = match normalize(address, false) {
        Ok(normalized) => normalized.into_string(),
        Err(_) => trim_trailing_slash(address.trim()).to_string(),
    };
    canonical.to_ascii_lowercase()
}

impl FederationConfigStore {
    pub fn new(settings: FederationSettings, state_path: Option<PathBuf>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            settings: RwLock::new(settings),
            state_path,
            revision,
        }
    }

    pub fn in_memory(settings: FederationSettings) -> Self {
        Self::new(settings, None)
    }

    pub fn settings(&self) -> FederationSettings {
        self.settings.read().clone()
    }

    pub fn policy(&self) -> FederationPolicy {
        self.settings.read().policy
    }

    pub fn peers(&self) -> Vec<PeerDescriptor> {
        self.settings.read().peers.clone()
    }

    pub fn state_path(&self) -> Option<&Path> {
        self.state_path.as_deref()
    }

    /// Receiver that observes a new revision after every accepted write.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Validates, normalizes, and appends a peer.
    ///
    /// The stored address is the canonical form. Duplicates are detected on
    /// canonical addresses, ignoring case.
    pub fn add_peer(
        &self,
        peer: PeerDescriptor,
    ) -> Result<PeerDescriptor, ConfigStoreError> {
        let stored = self.mutate(|settings| {
            let normalized =
                normalize(&peer.base_address, settings.policy.require_https)?;
            let key = normalized.as_str().to_ascii_lowercase();
            if settings
                .peers
                .iter()
                .any(|existing| identity(&existing.base_address) == key)
            {
                return Err(ConfigStoreError::DuplicatePeer(
                    normalized.into_string(),
                ));
            }

            let stored = PeerDescriptor {
                base_address: normalized.into_string(),
                ..peer
            };
            settings.peers.push(stored.clone());
            Ok(stored)
        })?;

        info!(peer = %stored.base_address, "peer added");
        Ok(stored)
    }

    /// Removes the peer whose stored address matches `address` literally or
    /// after normalization.
    pub fn remove_peer(
        &self,
        address: &str,
    ) -> Result<PeerDescriptor, ConfigStoreError> {
        let literal = address.trim();
        let key = identity(literal);

        let removed = self.mutate(|settings| {
            let position = settings
                .peers
                .iter()
                .position(|peer| {
                    peer.base_address.trim() == literal
                        || identity(&peer.base_address) == key
                })
                .ok_or_else(|| ConfigStoreError::PeerNotFound(literal.to_string()))?;
            Ok(settings.peers.remove(position))
        })?;

        info!(peer = %removed.base_address, "peer removed");
        Ok(removed)
    }

    /// Applies `update` to the policy flags and returns the new policy.
    pub fn update_policy<F>(
        &self,
        update: F,
    ) -> Result<FederationPolicy, ConfigStoreError>
    where
        F: FnOnce(&mut FederationPolicy),
    {
        let policy = self.mutate(|settings| {
            update(&mut settings.policy);
            Ok(settings.policy)
        })?;

        info!(?policy, "federation policy updated");
        Ok(policy)
    }

    /// Runs `change` on a copy of the settings; the copy replaces the live
    /// settings only once it has been persisted.
    fn mutate<T, F>(&self, change: F) -> Result<T, ConfigStoreError>
    where
        F: FnOnce(&mut FederationSettings) -> Result<T, ConfigStoreError>,
    {
        let result = {
            let mut live = self.settings.write();
            let mut next = live.clone();
            let result = change(&mut next)?;
            if let Some(path) = &self.state_path {
                write_state(path, &next)?;
            }
            *live = next;
            result
        };

        self.revision.send_modify(|revision| *revision += 1);
        Ok(result)
    }
}

impl FederationSnapshotSource for FederationConfigStore {
    fn federation_snapshot(&self) -> FederationSnapshot {
        self.settings.read().snapshot()
    }
}

/// Reads a previously persisted state file. A missing file yields `None`.
pub fn read_state(
    path: &Path,
) -> Result<Option<FederationSettings>, ConfigLoadError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let settings =
        toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Some(settings))
}

/// Atomically replaces the state file with `settings`.
fn write_state(
    path: &Path,
    settings: &FederationSettings,
) -> Result<(), ConfigStoreError> {
    let persist_err = |source: std::io::Error| ConfigStoreError::Persist {
        path: path.to_path_buf(),
        source,
    };

    let contents = toml::to_string_pretty(settings).map_err(|err| {
        persist_err(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(persist_err)?;

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(persist_err)?;
    file.write_all(contents.as_bytes()).map_err(persist_err)?;
    file.as_file().sync_all().map_err(persist_err)?;
    file.persist(path).map_err(|err| {
        warn!(path = %path.display(), "could not replace federation state file");
        persist_err(err.error)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_settings() -> FederationSettings {
        FederationSettings {
            policy: FederationPolicy {
                require_https: false,
                ..FederationPolicy::default()
            },
            peers: Vec::new(),
        }
    }

    #[test]
    fn add_peer_stores_canonical_address() {
        let store = FederationConfigStore::in_memory(open_settings());
        let stored = store
            .add_peer(PeerDescriptor::new(" peer.local:8096/ ", "key"))
            .unwrap();

        assert_eq!(stored.base_address, "http://peer.local:8096");
        assert_eq!(store.peers(), vec![stored]);
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn duplicate_detection_ignores_case_and_slashes() {
        let store = FederationConfigStore::in_memory(open_settings());
        store
            .add_peer(PeerDescriptor::new("http://Peer.Local:8096", ""))
            .unwrap();

        let err = store
            .add_peer(PeerDescriptor::new("HTTP://peer.local:8096/", ""))
            .unwrap_err();
        assert!(matches!(err, ConfigStoreError::DuplicatePeer(_)));
        assert_eq!(store.peers().len(), 1);
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn add_peer_enforces_https_policy() {
        let store = FederationConfigStore::in_memory(FederationSettings::default());
        let err = store
            .add_peer(PeerDescriptor::new("http://peer.local", ""))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigStoreError::Address(AddressError::HttpsRequired)
        ));
        assert!(store.peers().is_empty());
    }

    #[test]
    fn add_peer_rejects_scheme_without_host() {
        let store = FederationConfigStore::in_memory(open_settings());
        for address in ["https://", "http://"] {
            let err = store
                .add_peer(PeerDescriptor::new(address, ""))
                .unwrap_err();
            assert!(matches!(
                err,
                ConfigStoreError::Address(AddressError::InvalidAddress(_))
            ));
        }
        assert!(store.peers().is_empty());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn remove_peer_matches_literal_or_normalized() {
        let store = FederationConfigStore::in_memory(FederationSettings {
            peers: vec![
                PeerDescriptor::new("legacy-peer:8096", ""),
                PeerDescriptor::new("https://b.example", ""),
            ],
            ..open_settings()
        });

        store.remove_peer("legacy-peer:8096").unwrap();
        store.remove_peer("https://B.example/").unwrap();
        assert!(store.peers().is_empty());

        let err = store.remove_peer("https://gone.example").unwrap_err();
        assert!(matches!(err, ConfigStoreError::PeerNotFound(_)));
    }

    #[test]
    fn update_policy_publishes_revision() {
        let store = FederationConfigStore::in_memory(open_settings());
        let mut rx = store.subscribe();

        let policy = store
            .update_policy(|policy| policy.client_mode = false)
            .unwrap();

        assert!(!policy.client_mode);
        assert!(!store.policy().client_mode);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
    }

    #[test]
    fn snapshot_reflects_current_settings() {
        let store = FederationConfigStore::in_memory(open_settings());
        store
            .add_peer(PeerDescriptor::new("http://a", ""))
            .unwrap();

        let snapshot = store.federation_snapshot();
        assert_eq!(snapshot.peers.len(), 1);
        assert!(!snapshot.policy.require_https);
    }

    #[test]
    fn writes_are_persisted_and_reloadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("federation.toml");
        let store = FederationConfigStore::new(open_settings(), Some(path.clone()));

        store
            .add_peer(PeerDescriptor::new("https://a.example", "secret-key"))
            .unwrap();
        store
            .update_policy(|policy| policy.server_mode = false)
            .unwrap();

        let reloaded = read_state(&path).unwrap().unwrap();
        assert_eq!(reloaded, store.settings());
        assert_eq!(reloaded.peers[0].credential.expose(), "secret-key");
        assert!(!reloaded.policy.server_mode);
    }

    #[test]
    fn failed_persist_leaves_settings_untouched() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the state file should be makes the rename fail.
        let path = dir.path().join("occupied");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        let store = FederationConfigStore::new(open_settings(), Some(path));
        let err = store
            .add_peer(PeerDescriptor::new("http://a", ""))
            .unwrap_err();

        assert!(matches!(err, ConfigStoreError::Persist { .. }));
        assert!(store.peers().is_empty());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn missing_state_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_state(&dir.path().join("absent.toml")).unwrap().is_none());
    }
}
