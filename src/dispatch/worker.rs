// src/dispatch/worker.rs
// =============================================================================
// One worker: a loop that drives chains forward one step at a time.
//
// States:
//   AwaitWork -> Fetching -> Parsing -> Emitting -> Requeuing -> AwaitWork
//   AwaitWork -> Stopped (terminal)
//
// Rules:
// - AwaitWork is a real blocking wait on "job or stop token", no polling
// - A failed fetch or parse ends that chain only, never the worker
// - The record is emitted before the continuation is enqueued, so one
//   chain's records always reach the relay in sequence order
// - Stop tokens are only looked at in AwaitWork; a step in progress
//   always finishes first
// =============================================================================

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, trace, warn};

use super::queue::JobQueue;
use super::stats::{ChainOutcome, ChainStatus, DispatchStats};
use crate::chain::{Job, VisitedRecord};
use crate::fetch::Fetcher;
use crate::parse::{NextLink, PageParser};

/// Where a worker is in its loop. Each variant owns what the next step needs.
enum State {
    AwaitWork,
    Fetching(Job),
    Parsing(Job, String),
    Emitting(Job, Option<NextLink>),
    Requeuing(Job),
    Stopped,
}

// What woke a worker out of AwaitWork
enum Wake {
    Job(Job),
    Stop,
    QueueClosed,
}

pub struct Worker {
    pub id: usize,
    pub queue: Arc<JobQueue>,
    pub stop_rx: Arc<Mutex<mpsc::Receiver<()>>>,
    pub relay: mpsc::Sender<VisitedRecord>,
    pub fetcher: Arc<dyn Fetcher>,
    pub parser: Arc<dyn PageParser>,
    pub stats: Arc<DispatchStats>,
}

impl Worker {
    /// Runs until a stop token arrives (or the queue closes underneath it).
    pub async fn run(self) {
        info!(worker = self.id, "worker started");
        let mut state = State::AwaitWork;

        loop {
            state = match state {
                State::AwaitWork => self.await_work().await,
                State::Fetching(job) => self.fetch(job).await,
                State::Parsing(job, body) => self.parse(job, body),
                State::Emitting(job, next) => self.emit(job, next).await,
                State::Requeuing(job) => self.requeue(job).await,
                State::Stopped => break,
            };
        }

        self.stats.active_workers.fetch_sub(1, Ordering::SeqCst);
        info!(worker = self.id, "worker stopped");
    }

    async fn await_work(&self) -> State {
        // `biased` checks the stop token first; both branches block,
        // there is no default arm
        let wake = tokio::select! {
            biased;
            _ = self.next_stop_token() => Wake::Stop,
            job = self.queue.recv() => match job {
                Some(job) => Wake::Job(job),
                None => Wake::QueueClosed,
            },
        };
        DispatchStats::bump(&self.stats.wakeups);

        match wake {
            Wake::Stop => {
                debug!(worker = self.id, "received stop token");
                State::Stopped
            }
            Wake::QueueClosed => {
                debug!(worker = self.id, "job queue closed");
                State::Stopped
            }
            Wake::Job(job) => {
                DispatchStats::bump(&self.stats.jobs_dequeued);
                trace!(
                    worker = self.id,
                    chain_id = %job.chain_id(),
                    sequence = job.sequence(),
                    reference = %job.reference(),
                    label = %job.label(),
                    "got job"
                );

                if job.is_terminal() {
                    debug!(
                        chain_id = %job.chain_id(),
                        sequence = job.sequence(),
                        max_depth = job.max_depth(),
                        "job past depth limit, storing as terminal"
                    );
                    State::Emitting(job, None)
                } else {
                    State::Fetching(job)
                }
            }
        }
    }

    // A closed stop channel means nobody can stop us anymore; treat it as stop
    async fn next_stop_token(&self) {
        let _ = self.stop_rx.lock().await.recv().await;
    }

    async fn fetch(&self, job: Job) -> State {
        match self.fetcher.fetch(job.base_url(), job.reference()).await {
            // the last position needs no next link
            Ok(_) if job.sequence() >= job.max_depth() => State::Emitting(job, None),
            Ok(body) => State::Parsing(job, body),
            Err(e) => self.abort(&job, e.to_string()),
        }
    }

    fn parse(&self, job: Job, body: String) -> State {
        match self.parser.parse(&body) {
            Ok(next) => State::Emitting(job, Some(next)),
            Err(e) => self.abort(&job, e.to_string()),
        }
    }

    async fn emit(&self, job: Job, next: Option<NextLink>) -> State {
        // Suspends while the relay is full; this is what throttles fetching
        // down to storage speed
        if self.relay.send(VisitedRecord::from(&job)).await.is_err() {
            return self.abort(&job, "store relay closed".to_string());
        }
        DispatchStats::bump(&self.stats.records_emitted);

        let continuation = next.and_then(|next| job.continuation(next.label, next.reference));
        match continuation {
            Some(next_job) => State::Requeuing(next_job),
            None => {
                let status = if job.is_terminal() {
                    ChainStatus::Terminal
                } else {
                    ChainStatus::Completed
                };
                debug!(
                    chain_id = %job.chain_id(),
                    sequence = job.sequence(),
                    max_depth = job.max_depth(),
                    "chain finished"
                );
                self.finish(&job, status);
                State::AwaitWork
            }
        }
    }

    async fn requeue(&self, job: Job) -> State {
        match self.queue.requeue(job).await {
            Ok(()) => State::AwaitWork,
            Err(job) => self.abort(&job, "job queue closed".to_string()),
        }
    }

    fn abort(&self, job: &Job, reason: String) -> State {
        warn!(
            worker = self.id,
            chain_id = %job.chain_id(),
            sequence = job.sequence(),
            reference = %job.reference(),
            error = %reason,
            "chain aborted"
        );
        self.finish(job, ChainStatus::Aborted { reason });
        State::AwaitWork
    }

    fn finish(&self, job: &Job, status: ChainStatus) {
        self.stats.record_outcome(ChainOutcome {
            chain_id: job.chain_id().to_string(),
            sequence: job.sequence(),
            status,
        });
        self.queue.finish_chain();
    }
}
