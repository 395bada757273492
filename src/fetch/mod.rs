// src/fetch/mod.rs
// =============================================================================
// The fetch capability: turn (baseURL, reference) into a page body.
//
// Workers only see the Fetcher trait. The real implementation lives in
// http.rs and owns its own connection pool and cookie jar, so tests can hand
// the dispatcher a fake without touching any global state.
// =============================================================================

mod http;

use async_trait::async_trait;

use crate::error::FetchError;

pub use http::HttpFetcher;

/// Retrieves one page. Shared by every worker, so it must be thread-safe.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the body on a 2xx response. Anything else is a FetchError.
    async fn fetch(&self, base_url: &str, reference: &str) -> Result<String, FetchError>;
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why async_trait?
//    - Plain `async fn` in traits can't be used behind `dyn Trait` yet
//    - #[async_trait] rewrites each method to return a boxed future
//    - That lets us store an `Arc<dyn Fetcher>` and swap in fakes
//
// 2. Why Send + Sync?
//    - Every worker task holds the same Arc<dyn Fetcher>
//    - Tasks may run on different threads, so sharing must be safe
// -----------------------------------------------------------------------------
