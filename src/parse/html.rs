// src/parse/html.rs
// =============================================================================
// This module extracts the next link from an HTML page.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
// - Is built on html5ever (Mozilla's HTML parser)
//
// Page shape we expect:
//   <ul class="video-list">
//     <li><a href="/watch?v=abc" title="Next video">...</a></li>
//   </ul>
// =============================================================================

use scraper::{ElementRef, Html, Selector};

use super::{NextLink, PageParser};
use crate::error::ParseError;

/// Follows the first entry of a `ul.video-list`.
pub struct NextLinkParser {
    list: Selector,
    anchor: Selector,
}

impl NextLinkParser {
    pub fn new() -> Self {
        // Both selectors are constants and known to be valid
        Self {
            list: Selector::parse("ul.video-list").expect("static selector"),
            anchor: Selector::parse("a").expect("static selector"),
        }
    }

    // Walks every anchor in the list and returns the first one that has
    // both attributes. Reports which attribute was missing otherwise.
    fn first_complete_anchor(&self, list: ElementRef<'_>) -> Result<NextLink, ParseError> {
        let mut error = ParseError::MissingStructure;

        for anchor in list.select(&self.anchor) {
            let element = anchor.value();
            match (element.attr("href"), element.attr("title")) {
                (Some(href), Some(title)) if !href.is_empty() && !title.is_empty() => {
                    return Ok(NextLink {
                        label: title.to_string(),
                        reference: href.to_string(),
                    });
                }
                (Some(href), _) if !href.is_empty() => error = ParseError::MissingLabel,
                _ => error = ParseError::MissingReference,
            }
        }

        Err(error)
    }
}

impl Default for NextLinkParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PageParser for NextLinkParser {
    fn parse(&self, body: &str) -> Result<NextLink, ParseError> {
        let document = Html::parse_document(body);

        let list = document
            .select(&self.list)
            .next()
            .ok_or(ParseError::MissingStructure)?;

        self.first_complete_anchor(list)
    }
}
