// src/dispatch/queue.rs
// =============================================================================
// The job queue: one bounded channel shared by every worker.
//
// How it works:
// 1. A producer is admitted first (one permit per live chain), then sends
// 2. Workers take turns receiving through a shared receiver
// 3. A worker that finishes a step sends the continuation back in
//
// Why admission?
// - A worker that re-enqueues holds no permit of its own
// - If seeds could fill every slot, all workers might wait on a full queue
//   forever, each holding the job that would free a slot
// - With at most `capacity` live chains, and each chain occupying at most
//   one slot, a continuation send can always complete
// =============================================================================

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tracing::info;

use crate::chain::Job;
use crate::error::SubmitError;

pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    rx: Mutex<mpsc::Receiver<Job>>,
    admission: Arc<Semaphore>,
    live: watch::Sender<usize>,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let (live, _) = watch::channel(0);
        Self {
            tx,
            rx: Mutex::new(rx),
            admission: Arc::new(Semaphore::new(capacity)),
            live,
        }
    }

    /// Starts a new chain. Suspends while `capacity` chains are live.
    pub async fn admit(&self, job: Job) -> Result<(), SubmitError> {
        let permit = self
            .admission
            .acquire()
            .await
            .map_err(|_| SubmitError::Closed)?;
        // returned through finish_chain when the chain ends
        permit.forget();
        self.live.send_modify(|n| *n += 1);

        if self.tx.send(job).await.is_err() {
            self.finish_chain();
            return Err(SubmitError::Closed);
        }
        Ok(())
    }

    /// Re-enqueues the continuation of an already admitted chain.
    pub async fn requeue(&self, job: Job) -> Result<(), Job> {
        self.tx.send(job).await.map_err(|e| e.0)
    }

    /// Waits for the next job. `None` once the queue is closed and empty.
    ///
    /// Cancel-safe: dropping this future never loses a job.
    pub async fn recv(&self) -> Option<Job> {
        self.rx.lock().await.recv().await
    }

    /// A chain completed, aborted, or was stored as terminal.
    pub fn finish_chain(&self) {
        self.admission.add_permits(1);
        self.live.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Rejects new chains. Producers already waiting get `SubmitError::Closed`.
    pub fn close_admission(&self) {
        self.admission.close();
    }

    /// Closes the channel and discards whatever is still queued.
    ///
    /// Only call this once no worker can be sending anymore.
    pub async fn close(&self) -> usize {
        self.close_admission();

        let mut rx = self.rx.lock().await;
        rx.close();

        let mut discarded = 0;
        while let Ok(job) = rx.try_recv() {
            discarded += 1;
            info!(chain_id = %job.chain_id(), sequence = job.sequence(), "discarding pending job");
            self.finish_chain();
        }
        discarded
    }

    pub fn live_chains(&self) -> usize {
        *self.live.borrow()
    }

    /// Resolves as soon as no chain is live.
    pub async fn wait_idle(&self) {
        let mut rx = self.live.subscribe();
        // the sender lives as long as self, so this cannot fail
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn job(reference: &str) -> Job {
        Job::seed("https://example.com", reference, 3).unwrap()
    }

    #[tokio::test]
    async fn test_admit_then_recv() {
        let queue = JobQueue::new(4);
        queue.admit(job("/a")).await.unwrap();
        assert_eq!(queue.live_chains(), 1);

        let got = queue.recv().await.unwrap();
        assert_eq!(got.reference(), "/a");

        queue.finish_chain();
        assert_eq!(queue.live_chains(), 0);
    }

    #[tokio::test]
    async fn test_admission_suspends_when_full() {
        let queue = Arc::new(JobQueue::new(1));
        queue.admit(job("/a")).await.unwrap();

        let waiting = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.admit(job("/b")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());

        // chain /a ends, which lets /b in
        let _ = queue.recv().await.unwrap();
        queue.finish_chain();
        waiting.await.unwrap().unwrap();
        assert_eq!(queue.recv().await.unwrap().reference(), "/b");
    }

    #[tokio::test]
    async fn test_close_rejects_waiting_producers() {
        let queue = Arc::new(JobQueue::new(1));
        queue.admit(job("/a")).await.unwrap();

        let waiting = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.admit(job("/b")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let discarded = queue.close().await;
        assert_eq!(discarded, 1);
        assert_eq!(waiting.await.unwrap(), Err(SubmitError::Closed));
        assert_eq!(queue.live_chains(), 0);
        assert!(queue.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_wait_idle_returns_when_last_chain_ends() {
        let queue = Arc::new(JobQueue::new(2));
        queue.admit(job("/a")).await.unwrap();

        let idle = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.wait_idle().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!idle.is_finished());

        queue.finish_chain();
        idle.await.unwrap();
    }
}
