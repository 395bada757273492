// src/dispatch/stats.rs
// =============================================================================
// Counters shared by workers, the relay, and the API.
//
// Plain atomics: every writer only ever adds, and readers take a snapshot.
// =============================================================================

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// How a chain ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainStatus {
    /// Reached its depth limit
    Completed,
    /// Arrived past its depth limit and was only stored
    Terminal,
    /// A fetch or parse failed at `sequence`
    Aborted { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainOutcome {
    pub chain_id: String,
    /// Last sequence that was processed (or attempted, when aborted)
    pub sequence: u32,
    #[serde(flatten)]
    pub status: ChainStatus,
}

impl ChainOutcome {
    pub fn is_ok(&self) -> bool {
        !matches!(self.status, ChainStatus::Aborted { .. })
    }
}

#[derive(Default)]
pub struct DispatchStats {
    pub jobs_dequeued: AtomicU64,
    pub records_emitted: AtomicU64,
    pub records_stored: AtomicU64,
    pub store_failures: AtomicU64,
    pub chains_completed: AtomicU64,
    pub chains_aborted: AtomicU64,
    /// Transitions out of AwaitWork, one per job or stop token received
    pub wakeups: AtomicU64,
    pub active_workers: AtomicUsize,
    // None unless outcome tracking was requested
    outcomes: Option<Mutex<Vec<ChainOutcome>>>,
}

impl DispatchStats {
    pub fn new(track_outcomes: bool) -> Self {
        Self {
            outcomes: track_outcomes.then(|| Mutex::new(Vec::new())),
            ..Self::default()
        }
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: ChainOutcome) {
        match outcome.status {
            ChainStatus::Aborted { .. } => Self::bump(&self.chains_aborted),
            _ => Self::bump(&self.chains_completed),
        }

        if let Some(outcomes) = &self.outcomes {
            if let Ok(mut outcomes) = outcomes.lock() {
                outcomes.push(outcome);
            }
        }
    }

    pub fn outcomes(&self) -> Vec<ChainOutcome> {
        self.outcomes
            .as_ref()
            .and_then(|outcomes| outcomes.lock().ok().map(|o| o.clone()))
            .unwrap_or_default()
    }

    pub fn snapshot(&self, live_chains: usize) -> StatsSnapshot {
        StatsSnapshot {
            jobs_dequeued: self.jobs_dequeued.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            records_stored: self.records_stored.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            chains_completed: self.chains_completed.load(Ordering::Relaxed),
            chains_aborted: self.chains_aborted.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::SeqCst),
            live_chains,
        }
    }
}

/// Point-in-time copy of the counters, served as JSON by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub jobs_dequeued: u64,
    pub records_emitted: u64,
    pub records_stored: u64,
    pub store_failures: u64,
    pub chains_completed: u64,
    pub chains_aborted: u64,
    pub wakeups: u64,
    pub active_workers: usize,
    pub live_chains: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_only_kept_when_tracked() {
        let untracked = DispatchStats::new(false);
        untracked.record_outcome(ChainOutcome {
            chain_id: "a".to_string(),
            sequence: 3,
            status: ChainStatus::Completed,
        });
        assert!(untracked.outcomes().is_empty());
        assert_eq!(untracked.snapshot(0).chains_completed, 1);

        let tracked = DispatchStats::new(true);
        tracked.record_outcome(ChainOutcome {
            chain_id: "b".to_string(),
            sequence: 1,
            status: ChainStatus::Aborted { reason: "boom".to_string() },
        });
        let outcomes = tracked.outcomes();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_ok());
        assert_eq!(tracked.snapshot(0).chains_aborted, 1);
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let outcome = ChainOutcome {
            chain_id: "a".to_string(),
            sequence: 2,
            status: ChainStatus::Aborted { reason: "unexpected status 500".to_string() },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "aborted");
        assert_eq!(json["reason"], "unexpected status 500");
        assert_eq!(json["chain_id"], "a");
    }
}
