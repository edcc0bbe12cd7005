use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use futures::{StreamExt, stream};
use parking_lot::RwLock;
use peerlink_model::{
    AggregateEntry, AggregateKey, CancelReason, FederationSnapshot,
    MergeOutcome, MergeReport, MergeTrigger, PeerDescriptor, PeerMergeReport,
    RemoteCatalogItem, SkipReason,
};
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info, instrument, warn};
use uuid::Uuid;

use super::FederationSnapshotSource;
use crate::{
    aggregate::AggregateStore,
    error::{MergeError, PeerError},
    peer::PeerCatalogSource,
    url_policy::{self, trim_trailing_slash},
};

pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;
pub const DEFAULT_PASS_DEADLINE: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Peers fetched at once within a pass. `1` fetches strictly in order.
    pub fetch_concurrency: usize,
    /// Upper bound on both waiting for the gate and running a pass.
    pub pass_deadline: Duration,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            pass_deadline: DEFAULT_PASS_DEADLINE,
        }
    }
}

/// Result of fetching one peer, tagged with the address used for its keys.
struct PeerFetch {
    address: String,
    result: Result<Vec<RemoteCatalogItem>, PeerError>,
}

/// Runs merge passes and owns the single-flight gate.
pub struct MergeCoordinator {
    source: Arc<dyn PeerCatalogSource>,
    store: Arc<AggregateStore>,
    gate: Semaphore,
    config: MergeConfig,
    last_report: RwLock<Option<MergeReport>>,
}

impl fmt::Debug for MergeCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeCoordinator")
            .field("store", &self.store)
            .field("running", &self.is_running())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MergeCoordinator {
    pub fn new(
        source: Arc<dyn PeerCatalogSource>,
        store: Arc<AggregateStore>,
        config: MergeConfig,
    ) -> Self {
        Self {
            source,
            store,
            gate: Semaphore::new(1),
            config,
            last_report: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<AggregateStore> {
        &self.store
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// True while a pass holds the gate.
    pub fn is_running(&self) -> bool {
        self.gate.available_permits() == 0
    }

    pub fn last_report(&self) -> Option<MergeReport> {
        self.last_report.read().clone()
    }

    /// Runs one pass over an explicit snapshot.
    pub async fn run_merge_pass(
        &self,
        snapshot: FederationSnapshot,
        trigger: MergeTrigger,
        cancel: &CancellationToken,
    ) -> Result<MergeOutcome, MergeError> {
        self.run_with(move || snapshot, trigger, cancel).await
    }

    /// Runs one pass, reading the configuration once the gate is held.
    pub async fn run_from_source(
        &self,
        source: &dyn FederationSnapshotSource,
        trigger: MergeTrigger,
        cancel: &CancellationToken,
    ) -> Result<MergeOutcome, MergeError> {
        self.run_with(|| source.federation_snapshot(), trigger, cancel)
            .await
    }

    #[instrument(
        name = "merge_pass",
        skip_all,
        fields(trigger = %trigger, pass_id = tracing::field::Empty)
    )]
    async fn run_with<F>(
        &self,
        snapshot: F,
        trigger: MergeTrigger,
        cancel: &CancellationToken,
    ) -> Result<MergeOutcome, MergeError>
    where
        F: FnOnce() -> FederationSnapshot,
    {
        let _permit = self.acquire_gate(cancel).await?;

        let pass_id = Uuid::new_v4();
        Span::current().record("pass_id", tracing::field::display(pass_id));
        let started_at = Utc::now();
        let started = Instant::now();

        let snapshot = snapshot();
        let outcome = self.execute(&snapshot, cancel).await;

        match &outcome {
            MergeOutcome::Skipped { reason } => {
                info!(%reason, "merge pass skipped");
            }
            MergeOutcome::Completed { total_items, peers } => {
                info!(
                    total_items,
                    peers = peers.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "merge pass completed"
                );
            }
            MergeOutcome::Cancelled {
                reason,
                merged_items,
                ..
            } => {
                warn!(%reason, merged_items, "merge pass cancelled");
            }
        }

        *self.last_report.write() = Some(MergeReport {
            pass_id,
            trigger,
            started_at,
            finished_at: Utc::now(),
            outcome: outcome.clone(),
        });

        Ok(outcome)
    }

    async fn acquire_gate(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SemaphorePermit<'_>, MergeError> {
        if cancel.is_cancelled() {
            return Err(MergeError::Cancelled);
        }
        if let Ok(permit) = self.gate.try_acquire() {
            return Ok(permit);
        }

        debug!("merge pass already running; waiting for the gate");
        let wait = self.config.pass_deadline;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MergeError::Cancelled),
            acquired = tokio::time::timeout(wait, self.gate.acquire()) => {
                match acquired {
                    Ok(Ok(permit)) => Ok(permit),
                    // The gate is never closed.
                    Ok(Err(_)) => Err(MergeError::Cancelled),
                    Err(_) => Err(MergeError::GateTimeout { waited: wait }),
                }
            }
        }
    }

    async fn execute(
        &self,
        snapshot: &FederationSnapshot,
        cancel: &CancellationToken,
    ) -> MergeOutcome {
        let policy = snapshot.policy;
        if !policy.enable_federation {
            return MergeOutcome::Skipped {
                reason: SkipReason::FederationDisabled,
            };
        }
        if !policy.client_mode {
            return MergeOutcome::Skipped {
                reason: SkipReason::ClientModeDisabled,
            };
        }
        if snapshot.peers.is_empty() {
            return MergeOutcome::Skipped {
                reason: SkipReason::NoPeers,
            };
        }

        self.store.clear();

        let require_https = policy.require_https;
        let mut fetches = stream::iter(snapshot.peers.iter().cloned())
            .map(|peer| {
                let source = Arc::clone(&self.source);
                async move {
                    fetch_peer(source.as_ref(), peer, require_https).await
                }
            })
            .buffered(self.config.fetch_concurrency.max(1));

        let deadline = tokio::time::sleep(self.config.pass_deadline);
        tokio::pin!(deadline);

        let mut reports = Vec::with_capacity(snapshot.peers.len());
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return self.cancelled(CancelReason::Requested, reports);
                }
                _ = &mut deadline => {
                    return self.cancelled(CancelReason::DeadlineExceeded, reports);
                }
                next = fetches.next() => next,
            };

            let Some(fetch) = next else { break };
            reports.push(self.fold(fetch));
        }

        MergeOutcome::Completed {
            total_items: self.store.len(),
            peers: reports,
        }
    }

    fn cancelled(
        &self,
        reason: CancelReason,
        peers: Vec<PeerMergeReport>,
    ) -> MergeOutcome {
        MergeOutcome::Cancelled {
            reason,
            merged_items: self.store.len(),
            peers,
        }
    }

    /// Writes one peer's items into the store.
    fn fold(&self, fetch: PeerFetch) -> PeerMergeReport {
        let PeerFetch { address, result } = fetch;
        let items = match result {
            Ok(items) => items,
            Err(err) => {
                warn!(peer = %address, error = %err, "peer contributed no items");
                return PeerMergeReport {
                    peer_address: address,
                    items_merged: 0,
                    error: Some(err.to_string()),
                };
            }
        };

        let mut merged = 0usize;
        for item in items {
            if item.remote_id.trim().is_empty() {
                continue;
            }
            let key = AggregateKey::new(&address, &item.remote_id);
            self.store.put(key, AggregateEntry::from_remote(&address, item));
            merged += 1;
        }

        info!(peer = %address, items = merged, "aggregated peer items");
        PeerMergeReport {
            peer_address: address,
            items_merged: merged,
            error: None,
        }
    }
}

async fn fetch_peer(
    source: &dyn PeerCatalogSource,
    peer: PeerDescriptor,
    require_https: bool,
) -> PeerFetch {
    match url_policy::normalize(&peer.base_address, require_https) {
        Ok(address) => PeerFetch {
            result: source.fetch_catalog(&peer, require_https).await,
            address: address.into_string(),
        },
        Err(err) => PeerFetch {
            address: trim_trailing_slash(peer.base_address.trim()).to_string(),
            result: Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use peerlink_model::{FederationPolicy, ProbeResult};
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    /// Canned catalogs keyed by the raw peer address.
    #[derive(Default)]
    struct FakeSource {
        catalogs: HashMap<String, Vec<RemoteCatalogItem>>,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeSource {
        fn with(mut self, peer: &str, items: Vec<RemoteCatalogItem>) -> Self {
            self.catalogs.insert(peer.to_string(), items);
            self
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl PeerCatalogSource for FakeSource {
        async fn probe(
            &self,
            _peer: &PeerDescriptor,
            _require_https: bool,
        ) -> ProbeResult {
            ProbeResult::unreachable("not probed in tests")
        }

        async fn fetch_catalog(
            &self,
            peer: &PeerDescriptor,
            _require_https: bool,
        ) -> Result<Vec<RemoteCatalogItem>, PeerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.catalogs.get(&peer.base_address).cloned().ok_or(
                PeerError::Status {
                    code: 500,
                    reason: "Internal Server Error".into(),
                },
            )
        }
    }

    fn open_policy() -> FederationPolicy {
        FederationPolicy {
            require_https: false,
            ..FederationPolicy::default()
        }
    }

    fn snapshot(peers: &[&str]) -> FederationSnapshot {
        FederationSnapshot::new(
            open_policy(),
            peers.iter().map(|p| PeerDescriptor::new(*p, "")).collect(),
        )
    }

    fn coordinator(source: FakeSource) -> (Arc<FakeSource>, MergeCoordinator) {
        coordinator_with(source, MergeConfig::default())
    }

    fn coordinator_with(
        source: FakeSource,
        config: MergeConfig,
    ) -> (Arc<FakeSource>, MergeCoordinator) {
        let source = Arc::new(source);
        let coordinator = MergeCoordinator::new(
            Arc::clone(&source) as Arc<dyn PeerCatalogSource>,
            Arc::new(AggregateStore::new()),
            config,
        );
        (source, coordinator)
    }

    #[tokio::test]
    async fn test_disabled_federation_skips_and_keeps_store() {
        let (source, coordinator) = coordinator(
            FakeSource::default()
                .with("http://a", vec![RemoteCatalogItem::new("1", "Foo")]),
        );
        coordinator
            .store()
            .put(AggregateKey::new("http://old", "x"), AggregateEntry {
                peer_address: "http://old".into(),
                remote_id: "x".into(),
                display_name: "Stale".into(),
                media_kind: None,
            });

        let mut snap = snapshot(&["http://a"]);
        snap.policy.enable_federation = false;
        let outcome = coordinator
            .run_merge_pass(snap, MergeTrigger::ManualRefresh, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, MergeOutcome::Skipped {
            reason: SkipReason::FederationDisabled
        });
        assert_eq!(coordinator.store().len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_client_mode_off_and_no_peers_skip() {
        let (_, coordinator) = coordinator(FakeSource::default());

        let mut snap = snapshot(&["http://a"]);
        snap.policy.client_mode = false;
        let cancel = CancellationToken::new();
        let outcome = coordinator
            .run_merge_pass(snap, MergeTrigger::Startup, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Skipped {
            reason: SkipReason::ClientModeDisabled
        });

        let outcome = coordinator
            .run_merge_pass(snapshot(&[]), MergeTrigger::Startup, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Skipped {
            reason: SkipReason::NoPeers
        });
    }

    #[tokio::test]
    async fn test_same_id_on_two_peers_yields_two_entries() {
        let (_, coordinator) = coordinator(
            FakeSource::default()
                .with("http://a", vec![RemoteCatalogItem::new("1", "Foo")])
                .with("http://b", vec![RemoteCatalogItem::new("1", "Bar")]),
        );

        let outcome = coordinator
            .run_merge_pass(
                snapshot(&["http://a", "http://b"]),
                MergeTrigger::ManualRefresh,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(outcome.is_completed());
        let entries = coordinator.store().snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].peer_address, "http://a");
        assert_eq!(entries[0].display_name, "Foo");
        assert_eq!(entries[1].peer_address, "http://b");
        assert_eq!(entries[1].display_name, "Bar");
    }

    #[tokio::test]
    async fn test_repeated_pass_does_not_duplicate() {
        let (_, coordinator) = coordinator(
            FakeSource::default()
                .with("http://a", vec![RemoteCatalogItem::new("1", "Foo")]),
        );
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            coordinator
                .run_merge_pass(
                    snapshot(&["http://a"]),
                    MergeTrigger::ScheduledTick,
                    &cancel,
                )
                .await
                .unwrap();
        }

        assert_eq!(coordinator.store().len(), 1);
    }

    #[tokio::test]
    async fn test_pass_replaces_items_of_removed_peer() {
        let (_, coordinator) = coordinator(
            FakeSource::default()
                .with("http://a", vec![RemoteCatalogItem::new("1", "Foo")])
                .with("http://b", vec![RemoteCatalogItem::new("2", "Bar")]),
        );
        let cancel = CancellationToken::new();

        coordinator
            .run_merge_pass(
                snapshot(&["http://a", "http://b"]),
                MergeTrigger::Startup,
                &cancel,
            )
            .await
            .unwrap();
        coordinator
            .run_merge_pass(
                snapshot(&["http://b"]),
                MergeTrigger::ConfigChanged,
                &cancel,
            )
            .await
            .unwrap();

        let entries = coordinator.store().snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].peer_address, "http://b");
    }

    #[tokio::test]
    async fn test_blank_ids_are_not_merged() {
        let (_, coordinator) = coordinator(FakeSource::default().with(
            "http://a",
            vec![
                RemoteCatalogItem::new("  ", "Blank"),
                RemoteCatalogItem::new("2", "Kept"),
            ],
        ));

        let outcome = coordinator
            .run_merge_pass(
                snapshot(&["http://a"]),
                MergeTrigger::ManualRefresh,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.items_for("http://a"), Some(1));
        assert_eq!(coordinator.store().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_peer_does_not_abort_pass() {
        let (_, coordinator) = coordinator(
            FakeSource::default()
                .with("http://b", vec![RemoteCatalogItem::new("7", "Kept")]),
        );

        let outcome = coordinator
            .run_merge_pass(
                snapshot(&["http://a", "http://b"]),
                MergeTrigger::ManualRefresh,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let MergeOutcome::Completed { total_items, peers } = outcome else {
            panic!("expected a completed pass");
        };
        assert_eq!(total_items, 1);
        assert_eq!(peers[0].items_merged, 0);
        assert_eq!(peers[0].error.as_deref(), Some("HTTP 500 Internal Server Error"));
        assert_eq!(peers[1].items_merged, 1);
        assert!(peers[1].error.is_none());
    }

    #[tokio::test]
    async fn test_invalid_and_insecure_peers_are_reported() {
        let (source, coordinator) = coordinator(
            FakeSource::default()
                .with("https://ok", vec![RemoteCatalogItem::new("1", "Foo")]),
        );
        let snap = FederationSnapshot::new(FederationPolicy::default(), vec![
            PeerDescriptor::new("http://plain/", ""),
            PeerDescriptor::new("https://ok", ""),
        ]);

        let outcome = coordinator
            .run_merge_pass(snap, MergeTrigger::Startup, &CancellationToken::new())
            .await
            .unwrap();

        let reports = outcome.peer_reports();
        assert_eq!(reports[0].peer_address, "http://plain");
        assert_eq!(
            reports[0].error.as_deref(),
            Some("HTTPS required by configuration")
        );
        assert_eq!(outcome.items_for("https://ok"), Some(1));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_keys_use_normalized_address() {
        let (_, coordinator) = coordinator(
            FakeSource::default()
                .with("peer.local:8096/", vec![RemoteCatalogItem::new("1", "Foo")]),
        );

        coordinator
            .run_merge_pass(
                snapshot(&["peer.local:8096/"]),
                MergeTrigger::Startup,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let key = AggregateKey::new("http://peer.local:8096", "1");
        assert!(coordinator.store().get(&key).is_some());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (_, coordinator) = coordinator(FakeSource::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = coordinator
            .run_merge_pass(snapshot(&["http://a"]), MergeTrigger::Startup, &cancel)
            .await;
        assert_eq!(result, Err(MergeError::Cancelled));
        assert!(coordinator.last_report().is_none());
    }

    #[tokio::test]
    async fn test_cancellation_mid_pass_stops_fetching() {
        let items = vec![RemoteCatalogItem::new("1", "Foo")];
        let (source, coordinator) = coordinator_with(
            FakeSource::default()
                .with("http://a", items.clone())
                .with("http://b", items.clone())
                .with("http://c", items)
                .delayed(Duration::from_millis(200)),
            MergeConfig {
                fetch_concurrency: 1,
                ..MergeConfig::default()
            },
        );
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            })
        };

        let outcome = coordinator
            .run_merge_pass(
                snapshot(&["http://a", "http://b", "http://c"]),
                MergeTrigger::ManualRefresh,
                &cancel,
            )
            .await
            .unwrap();
        canceller.await.unwrap();

        assert!(matches!(outcome, MergeOutcome::Cancelled {
            reason: CancelReason::Requested,
            ..
        }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        let report = coordinator.last_report().unwrap();
        assert_eq!(report.outcome, outcome);
    }

    #[tokio::test]
    async fn test_deadline_cancels_slow_pass() {
        let (_, coordinator) = coordinator_with(
            FakeSource::default()
                .with("http://a", vec![RemoteCatalogItem::new("1", "Foo")])
                .delayed(Duration::from_millis(500)),
            MergeConfig {
                fetch_concurrency: 1,
                pass_deadline: Duration::from_millis(50),
            },
        );

        let outcome = coordinator
            .run_merge_pass(
                snapshot(&["http://a"]),
                MergeTrigger::ScheduledTick,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, MergeOutcome::Cancelled {
            reason: CancelReason::DeadlineExceeded,
            merged_items: 0,
            ..
        }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_passes_never_overlap() {
        let items = vec![RemoteCatalogItem::new("1", "Foo")];
        let (source, coordinator) = coordinator_with(
            FakeSource::default()
                .with("http://a", items.clone())
                .with("http://b", items)
                .delayed(Duration::from_millis(30)),
            MergeConfig {
                fetch_concurrency: 2,
                ..MergeConfig::default()
            },
        );
        let coordinator = Arc::new(coordinator);

        let passes: Vec<_> = (0..4)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    coordinator
                        .run_merge_pass(
                            snapshot(&["http://a", "http://b"]),
                            MergeTrigger::ManualRefresh,
                            &CancellationToken::new(),
                        )
                        .await
                })
            })
            .collect();

        for pass in passes {
            assert!(pass.await.unwrap().unwrap().is_completed());
        }

        assert_eq!(source.calls.load(Ordering::SeqCst), 8);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.store().len(), 2);
    }

    #[tokio::test]
    async fn test_waiting_trigger_times_out_on_gate() {
        let (_, coordinator) = coordinator_with(
            FakeSource::default().with("http://a", vec![]),
            MergeConfig {
                fetch_concurrency: 1,
                pass_deadline: Duration::from_millis(50),
            },
        );
        let _held = coordinator.gate.acquire().await.unwrap();
        assert!(coordinator.is_running());

        let result = coordinator
            .run_merge_pass(
                snapshot(&["http://a"]),
                MergeTrigger::ManualRefresh,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(
            result,
            Err(MergeError::GateTimeout {
                waited: Duration::from_millis(50)
            })
        );
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting_on_gate() {
        let (_, coordinator) = coordinator(FakeSource::default());
        let _held = coordinator.gate.acquire().await.unwrap();
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        let result = coordinator
            .run_merge_pass(snapshot(&["http://a"]), MergeTrigger::ScheduledTick, &cancel)
            .await;
        canceller.await.unwrap();
        assert_eq!(result, Err(MergeError::Cancelled));
    }

    #[tokio::test]
    async fn test_run_from_source_reads_current_config() {
        let (_, coordinator) = coordinator(
            FakeSource::default()
                .with("http://a", vec![RemoteCatalogItem::new("1", "Foo")])
                .with("http://b", vec![RemoteCatalogItem::new("2", "Bar")]),
        );
        let config = parking_lot::RwLock::new(snapshot(&["http://a"]));
        config.write().peers.push(PeerDescriptor::new("http://b", ""));

        coordinator
            .run_from_source(&config, MergeTrigger::ConfigChanged, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(coordinator.store().len(), 2);
        let report = coordinator.last_report().unwrap();
        assert_eq!(report.trigger, MergeTrigger::ConfigChanged);
        assert!(report.finished_at >= report.started_at);
    }
}
