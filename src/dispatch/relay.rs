// src/dispatch/relay.rs
// =============================================================================
// The store relay: the single loop between all workers and storage.
//
// - Store failures are logged and counted; the loop keeps going
// - When the channel closes (every sender dropped), the loop drains what
//   is left, closes the store once, and fires the shutdown event once
// =============================================================================

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use super::stats::DispatchStats;
use crate::chain::VisitedRecord;
use crate::store::RecordSink;

pub async fn run_relay<S: RecordSink>(
    mut records: mpsc::Receiver<VisitedRecord>,
    mut sink: S,
    stats: Arc<DispatchStats>,
    shutdown: watch::Sender<bool>,
) {
    while let Some(record) = records.recv().await {
        match sink.store(&record).await {
            Ok(()) => DispatchStats::bump(&stats.records_stored),
            Err(e) => {
                DispatchStats::bump(&stats.store_failures);
                warn!(
                    chain_id = %record.chain_id,
                    sequence = record.sequence,
                    label = %record.label,
                    reference = %record.reference,
                    error = %e,
                    "failed to store record"
                );
            }
        }
    }

    info!("store relay closed, closing storage");
    sink.close().await;

    shutdown.send_replace(true);
    info!("shutdown signalled");
}
