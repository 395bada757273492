// src/api/mod.rs
// =============================================================================
// The HTTP surface around the dispatcher.
//
// Routes:
//   POST /api/v1/link?depth=N   body = seed reference   -> 201 Created
//   POST /api/v1/stop                                   -> 200 OK
//   GET  /api/v1/stats                                  -> JSON counters
//   GET  /healthz                                       -> 200 OK
//
// The server runs until the dispatcher's shutdown event fires, so a stop
// request (or ctrl-c) ends the process once storage has been closed.
// =============================================================================

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::dispatch::{Dispatcher, StatsSnapshot};
use crate::error::SubmitError;

#[derive(Debug, Deserialize)]
struct LinkParams {
    depth: Option<u32>,
}

pub fn router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/link", post(submit_link))
        .route("/api/v1/stop", post(stop_all))
        .route("/api/v1/stats", get(stats))
        .with_state(dispatcher)
}

/// Binds `bind` and serves until the dispatcher shuts down.
pub async fn serve(dispatcher: Dispatcher, bind: &str) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address {}", bind))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    eprintln!("🌐 Listening on http://{}", addr);
    serve_on(listener, dispatcher).await
}

/// Serves on `bind`, then stops the dispatcher and waits for storage to
/// close, whether the server ended normally or failed to start.
pub async fn serve_until_shutdown(dispatcher: Dispatcher, bind: &str) -> Result<()> {
    let served = serve(dispatcher.clone(), bind).await;
    if let Err(e) = &served {
        warn!(error = %format!("{:#}", e), "http server ended with an error");
    }

    dispatcher.stop();
    dispatcher.wait_shutdown().await;
    served
}

pub async fn serve_on(listener: TcpListener, dispatcher: Dispatcher) -> Result<()> {
    let shutdown = dispatcher.clone();
    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(async move {
            shutdown.wait_shutdown().await;
            info!("dispatcher shut down, stopping http server");
        })
        .await
        .context("http server failed")
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn submit_link(
    State(dispatcher): State<Dispatcher>,
    Query(params): Query<LinkParams>,
    body: String,
) -> (StatusCode, &'static str) {
    match dispatcher.submit(&body, params.depth).await {
        Ok(()) => (StatusCode::CREATED, ""),
        Err(SubmitError::EmptySeed) => (StatusCode::BAD_REQUEST, "Invalid payload"),
        Err(SubmitError::Closed) => {
            warn!(seed = %body.trim(), "seed rejected, dispatcher stopped");
            (StatusCode::SERVICE_UNAVAILABLE, "Dispatcher is stopped")
        }
    }
}

async fn stop_all(State(dispatcher): State<Dispatcher>) -> StatusCode {
    info!("stop requested over http");
    dispatcher.stop();
    StatusCode::OK
}

async fn stats(State(dispatcher): State<Dispatcher>) -> Json<StatsSnapshot> {
    Json(dispatcher.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::VisitedRecord;
    use crate::dispatch::DispatcherConfig;
    use crate::error::{FetchError, StoreError};
    use crate::fetch::Fetcher;
    use crate::parse::NextLinkParser;
    use crate::store::RecordSink;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    // Every page points at itself, so chains just run to their depth limit
    struct LoopFetcher;

    #[async_trait]
    impl Fetcher for LoopFetcher {
        async fn fetch(&self, _base_url: &str, reference: &str) -> Result<String, FetchError> {
            Ok(format!(
                r#"<ul class="video-list"><li><a href="{0}" title="Title of {0}">x</a></li></ul>"#,
                reference
            ))
        }
    }

    // Holds every fetch until the test releases it, so a chain can be kept
    // busy while the dispatcher is being stopped
    #[derive(Default)]
    struct GateFetcher {
        started: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl Fetcher for GateFetcher {
        async fn fetch(&self, base_url: &str, reference: &str) -> Result<String, FetchError> {
            self.started.notify_one();
            self.release.notified().await;
            LoopFetcher.fetch(base_url, reference).await
        }
    }

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<VisitedRecord>>>);

    #[async_trait]
    impl RecordSink for SharedSink {
        async fn store(&mut self, record: &VisitedRecord) -> Result<(), StoreError> {
            self.0.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn close(&mut self) {}
    }

    fn dispatcher(fetcher: Arc<dyn Fetcher>, sink: SharedSink) -> Dispatcher {
        Dispatcher::start(
            DispatcherConfig {
                workers: 2,
                queue_capacity: 16,
                relay_capacity: 16,
                base_url: "http://pages.test".to_string(),
                default_depth: 2,
                track_outcomes: false,
            },
            fetcher,
            Arc::new(NextLinkParser::new()),
            sink,
        )
    }

    async fn start() -> (String, Dispatcher, SharedSink, tokio::task::JoinHandle<Result<()>>) {
        start_with(Arc::new(LoopFetcher)).await
    }

    async fn start_with(
        fetcher: Arc<dyn Fetcher>,
    ) -> (String, Dispatcher, SharedSink, tokio::task::JoinHandle<Result<()>>) {
        let sink = SharedSink::default();
        let dispatcher = dispatcher(fetcher, sink.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(serve_on(listener, dispatcher.clone()));
        (base, dispatcher, sink, server)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_stop_and_shutdown() {
        let (base, dispatcher, sink, server) = start().await;
        let client = reqwest::Client::new();

        let res = client
            .post(format!("{}/api/v1/link?depth=3", base))
            .body("/watch?v=abc")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 201);

        dispatcher.wait_idle().await;

        let res = client.get(format!("{}/api/v1/stats", base)).send().await.unwrap();
        let stats: serde_json::Value = serde_json::from_str(&res.text().await.unwrap()).unwrap();
        assert_eq!(stats["chains_completed"], 1);
        assert_eq!(stats["active_workers"], 2);

        let res = client.post(format!("{}/api/v1/stop", base)).send().await.unwrap();
        assert_eq!(res.status().as_u16(), 200);

        // the server exits on its own once storage is closed
        server.await.unwrap().unwrap();
        let records = sink.0.lock().unwrap().clone();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.chain_id == "abc"));
        assert_eq!(records[3].label, "Title of /watch?v=abc");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rejects_empty_payload_and_get() {
        let (base, dispatcher, _sink, server) = start().await;
        let client = reqwest::Client::new();

        let res = client
            .post(format!("{}/api/v1/link", base))
            .body("")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 400);

        let res = client.get(format!("{}/api/v1/link", base)).send().await.unwrap();
        assert_eq!(res.status().as_u16(), 405);

        let res = client.get(format!("{}/healthz", base)).send().await.unwrap();
        assert_eq!(res.status().as_u16(), 200);

        dispatcher.stop();
        server.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_after_stop_is_unavailable() {
        let fetcher = Arc::new(GateFetcher::default());
        let (base, dispatcher, sink, server) = start_with(fetcher.clone()).await;
        let client = reqwest::Client::new();

        let res = client
            .post(format!("{}/api/v1/link", base))
            .body("/watch?v=busy")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 201);

        // a worker is now inside a fetch, so shutdown cannot complete and
        // the listener stays open after stop
        fetcher.started.notified().await;
        dispatcher.stop();
        assert!(!dispatcher.is_shut_down());

        let res = client
            .post(format!("{}/api/v1/link", base))
            .body("/watch?v=late")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 503);
        assert_eq!(res.text().await.unwrap(), "Dispatcher is stopped");

        fetcher.release.notify_one();
        server.await.unwrap().unwrap();
        assert!(dispatcher.is_shut_down());

        // the step in progress still finished and was stored
        let records = sink.0.lock().unwrap().clone();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].chain_id, "busy");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_bind_still_shuts_down_dispatcher() {
        // occupy a port so the second bind fails
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let bind = taken.local_addr().unwrap().to_string();

        let dispatcher = dispatcher(Arc::new(LoopFetcher), SharedSink::default());
        let result = serve_until_shutdown(dispatcher.clone(), &bind).await;

        assert!(result.is_err());
        assert!(dispatcher.is_shut_down());
        assert_eq!(dispatcher.active_workers(), 0);
        assert_eq!(dispatcher.submit("/watch?v=x", None).await, Err(SubmitError::Closed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invalid_bind_address_still_shuts_down_dispatcher() {
        let dispatcher = dispatcher(Arc::new(LoopFetcher), SharedSink::default());
        let result = serve_until_shutdown(dispatcher.clone(), "not-an-address").await;

        assert!(result.is_err());
        assert!(dispatcher.is_shut_down());
    }
}
