use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// What asked for a merge pass. Recorded for logs and reports only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum MergeTrigger {
    Startup,
    ConfigChanged,
    ManualRefresh,
    ScheduledTick,
}

impl fmt::Display for MergeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MergeTrigger::Startup => "startup",
            MergeTrigger::ConfigChanged => "config_changed",
            MergeTrigger::ManualRefresh => "manual_refresh",
            MergeTrigger::ScheduledTick => "scheduled_tick",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum SkipReason {
    FederationDisabled,
    ClientModeDisabled,
    NoPeers,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SkipReason::FederationDisabled => "federation disabled",
            SkipReason::ClientModeDisabled => "client mode disabled",
            SkipReason::NoPeers => "no peers",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum CancelReason {
    Requested,
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CancelReason::Requested => "cancellation requested",
            CancelReason::DeadlineExceeded => "pass deadline exceeded",
        };
        f.write_str(label)
    }
}

/// Contribution of a single peer to one merge pass.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerMergeReport {
    pub peer_address: String,
    pub items_merged: usize,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "outcome", rename_all = "snake_case")
)]
pub enum MergeOutcome {
    Skipped {
        reason: SkipReason,
    },
    Completed {
        total_items: usize,
        peers: Vec<PeerMergeReport>,
    },
    Cancelled {
        reason: CancelReason,
        merged_items: usize,
        peers: Vec<PeerMergeReport>,
    },
}

impl MergeOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, MergeOutcome::Completed { .. })
    }

    pub fn peer_reports(&self) -> &[PeerMergeReport] {
        match self {
            MergeOutcome::Skipped { .. } => &[],
            MergeOutcome::Completed { peers, .. }
            | MergeOutcome::Cancelled { peers, .. } => peers,
        }
    }

    /// Items merged for `peer_address` in this pass, if the peer was visited.
    pub fn items_for(&self, peer_address: &str) -> Option<usize> {
        self.peer_reports()
            .iter()
            .filter(|report| report.peer_address == peer_address)
            .map(|report| report.items_merged)
            .last()
    }
}

/// Record of a finished merge pass.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergeReport {
    pub pass_id: Uuid,
    pub trigger: MergeTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: MergeOutcome,
}
