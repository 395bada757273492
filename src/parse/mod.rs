// src/parse/mod.rs
// =============================================================================
// The parse capability: find the "next" reference and its label in a page.
//
// Submodules:
// - html: the scraper-based parser for video-list style pages
// =============================================================================

mod html;

use crate::error::ParseError;

pub use html::NextLinkParser;

/// What a page points to next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextLink {
    pub label: String,
    pub reference: String,
}

/// Extracts the next link from a fetched body.
///
/// Synchronous on purpose: parsed documents are not `Send`, so they must
/// never be held across an `.await`.
pub trait PageParser: Send + Sync {
    fn parse(&self, body: &str) -> Result<NextLink, ParseError>;
}
