// src/chain/mod.rs
// =============================================================================
// This module holds the data model of a chain.
//
// A chain starts at a seed reference and grows one position at a time:
// - Job: one position waiting to be processed
// - VisitedRecord: the audit entry written once a position was reached
//
// Both are plain values. They move through the queues by value, so two
// chains running at the same time can never see each other's data.
// =============================================================================

mod job;

pub use job::{Job, VisitedRecord};
