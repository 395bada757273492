// src/chain/job.rs
// =============================================================================
// Job and VisitedRecord values.
//
// Lifecycle of a Job:
// 1. Created by a producer (seed, sequence 0) or by a worker (continuation)
// 2. Held in the job queue until exactly one worker takes it
// 3. Dropped once its record (and possibly its continuation) was produced
//
// Rust concepts:
// - Private fields + getters: nobody outside this file can mutate a Job
// - Consuming constructors: a continuation is a new value, never an edit
// =============================================================================

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::error::SubmitError;

/// One position within a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    chain_id: String,
    sequence: u32,
    max_depth: u32,
    base_url: String,
    reference: String,
    label: String,
}

impl Job {
    /// Builds the first Job of a new chain.
    ///
    /// The chain id is derived from the seed reference and never changes
    /// afterwards. A `max_depth` of 0 is rejected by the caller's config
    /// layer, here it is clamped up to 1 so the invariant always holds.
    pub fn seed(base_url: &str, reference: &str, max_depth: u32) -> Result<Self, SubmitError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(SubmitError::EmptySeed);
        }

        Ok(Self {
            chain_id: derive_chain_id(reference),
            sequence: 0,
            max_depth: max_depth.max(1),
            base_url: base_url.to_string(),
            reference: reference.to_string(),
            label: String::new(),
        })
    }

    /// Rebuilds a Job at an arbitrary position, used to resume a chain.
    pub fn resume(
        chain_id: impl Into<String>,
        sequence: u32,
        max_depth: u32,
        base_url: impl Into<String>,
        reference: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            chain_id: chain_id.into(),
            sequence,
            max_depth: max_depth.max(1),
            base_url: base_url.into(),
            reference: reference.into(),
            label: label.into(),
        }
    }

    /// The Job one step further down the chain, or `None` when this Job
    /// already sits at the depth limit.
    pub fn continuation(&self, label: String, reference: String) -> Option<Job> {
        if self.sequence >= self.max_depth {
            return None;
        }

        Some(Job {
            chain_id: self.chain_id.clone(),
            sequence: self.sequence + 1,
            max_depth: self.max_depth,
            base_url: self.base_url.clone(),
            reference,
            label,
        })
    }

    /// Past the depth limit: store it, never fetch it.
    pub fn is_terminal(&self) -> bool {
        self.sequence > self.max_depth
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Audit entry saying "this position was reached".
///
/// Written once by a worker, consumed once by the store relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitedRecord {
    pub chain_id: String,
    pub sequence: u32,
    pub max_depth: u32,
    pub base_url: String,
    pub reference: String,
    pub label: String,
}

impl From<&Job> for VisitedRecord {
    fn from(job: &Job) -> Self {
        Self {
            chain_id: job.chain_id.clone(),
            sequence: job.sequence,
            max_depth: job.max_depth,
            base_url: job.base_url.clone(),
            reference: job.reference.clone(),
            label: job.label.clone(),
        }
    }
}

// Derives a stable chain id from a seed reference
//
// Examples:
//   "/watch?v=DT61L8hbbJ4" -> "DT61L8hbbJ4"
//   "/wiki/Rust"           -> "wiki/Rust"
pub fn derive_chain_id(reference: &str) -> String {
    if let Some((_, query)) = reference.split_once('?') {
        let id = form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned());

        if let Some(id) = id.filter(|id| !id.is_empty()) {
            return id;
        }
    }

    match reference.trim_start_matches('/') {
        "" => reference.to_string(),
        trimmed => trimmed.to_string(),
    }
}
