// src/dispatch/mod.rs
// =============================================================================
// The crawl-dispatch core.
//
// Pieces:
// - queue: the bounded, self-feeding job queue
// - worker: N loops that drain it and push continuations back
// - relay: the hand-off from workers to storage
// - stats: shared counters
//
// This file is the stop/shutdown coordinator. It owns the pieces, hands
// out stop tokens, and once every worker has stopped it closes the job
// queue, then the relay, which in turn closes storage and fires the single
// shutdown event.
// =============================================================================

mod queue;
mod relay;
mod stats;
mod worker;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::chain::{Job, VisitedRecord};
use crate::error::SubmitError;
use crate::fetch::Fetcher;
use crate::parse::PageParser;
use crate::store::RecordSink;

use queue::JobQueue;
use worker::Worker;

pub use stats::{ChainOutcome, ChainStatus, StatsSnapshot};

use stats::DispatchStats;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub relay_capacity: usize,
    /// Origin every seed reference is resolved against
    pub base_url: String,
    /// Used when a seed is submitted without a depth (or with 0)
    pub default_depth: u32,
    /// Keep a per-chain outcome list (one-shot runs); off for servers
    pub track_outcomes: bool,
}

/// Cheap to clone handle to a running dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

struct Shared {
    config: DispatcherConfig,
    queue: Arc<JobQueue>,
    stop_tx: mpsc::Sender<()>,
    stats: Arc<DispatchStats>,
    shutdown: watch::Receiver<bool>,
}

impl Dispatcher {
    /// Spawns the workers, the relay, and the coordinator onto the current
    /// tokio runtime.
    pub fn start<S>(
        config: DispatcherConfig,
        fetcher: Arc<dyn Fetcher>,
        parser: Arc<dyn PageParser>,
        sink: S,
    ) -> Self
    where
        S: RecordSink + 'static,
    {
        let workers = config.workers.max(1);
        let queue = Arc::new(JobQueue::new(config.queue_capacity.max(1)));
        let stats = Arc::new(DispatchStats::new(config.track_outcomes));

        // one slot per worker, so stop() never has to wait
        let (stop_tx, stop_rx) = mpsc::channel(workers);
        let stop_rx = Arc::new(Mutex::new(stop_rx));
        let (relay_tx, relay_rx) = mpsc::channel(config.relay_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let relay = tokio::spawn(relay::run_relay(relay_rx, sink, stats.clone(), shutdown_tx));

        let mut pool = JoinSet::new();
        for id in 1..=workers {
            let worker = Worker {
                id,
                queue: queue.clone(),
                stop_rx: stop_rx.clone(),
                relay: relay_tx.clone(),
                fetcher: fetcher.clone(),
                parser: parser.clone(),
                stats: stats.clone(),
            };
            stats.active_workers.fetch_add(1, Ordering::SeqCst);
            pool.spawn(worker.run().instrument(info_span!("worker", id)));
        }
        info!(workers, "dispatcher started");

        tokio::spawn(coordinate(pool, queue.clone(), relay_tx, relay));

        Self {
            shared: Arc::new(Shared {
                config,
                queue,
                stop_tx,
                stats,
                shutdown: shutdown_rx,
            }),
        }
    }

    /// Starts a new chain at `seed_reference`. Fire-and-forget: only
    /// admission problems are reported, never what happens to the chain.
    ///
    /// Suspends while the maximum number of chains is live.
    pub async fn submit(&self, seed_reference: &str, max_depth: Option<u32>) -> Result<(), SubmitError> {
        let config = &self.shared.config;
        let depth = max_depth
            .filter(|d| *d > 0)
            .unwrap_or(config.default_depth);

        let job = Job::seed(&config.base_url, seed_reference, depth)?;
        debug!(chain_id = %job.chain_id(), max_depth = job.max_depth(), "submitting seed");
        self.shared.queue.admit(job).await
    }

    /// Admits an already formed job, e.g. to resume a chain mid-way.
    pub async fn enqueue(&self, job: Job) -> Result<(), SubmitError> {
        self.shared.queue.admit(job).await
    }

    /// Sends one stop token per worker and closes admission.
    ///
    /// Never blocks. Tokens beyond the number of still running workers are
    /// dropped, so calling this twice is harmless.
    pub fn stop(&self) {
        self.shared.queue.close_admission();

        let mut sent = 0;
        for _ in 0..self.shared.config.workers.max(1) {
            if self.shared.stop_tx.try_send(()).is_err() {
                break;
            }
            sent += 1;
        }
        info!(tokens = sent, "stop requested");
    }

    /// Resolves once every worker stopped and storage was closed.
    pub async fn wait_shutdown(&self) {
        let mut shutdown = self.shared.shutdown.clone();
        // a dropped sender means the relay is gone, which is shutdown too
        let _ = shutdown.wait_for(|done| *done).await;
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shared.shutdown.borrow()
    }

    /// Resolves when no chain is live anymore.
    pub async fn wait_idle(&self) {
        self.shared.queue.wait_idle().await
    }

    pub fn active_workers(&self) -> usize {
        self.shared.stats.active_workers.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot(self.shared.queue.live_chains())
    }

    pub fn outcomes(&self) -> Vec<ChainOutcome> {
        self.shared.stats.outcomes()
    }
}

// Waits for every worker, then closes the job queue and the relay in that
// order. No worker can be mid-send on either channel at that point.
async fn coordinate(
    mut pool: JoinSet<()>,
    queue: Arc<JobQueue>,
    relay_tx: mpsc::Sender<VisitedRecord>,
    relay: tokio::task::JoinHandle<()>,
) {
    while let Some(result) = pool.join_next().await {
        if let Err(e) = result {
            warn!(error = %e, "worker task ended abnormally");
        }
    }

    let discarded = queue.close().await;
    info!(discarded, "all workers stopped, job queue closed");

    drop(relay_tx);
    if let Err(e) = relay.await {
        warn!(error = %e, "store relay ended abnormally");
    }
}
