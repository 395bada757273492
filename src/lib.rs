// src/lib.rs
// =============================================================================
// chainwalk follows chains of linked pages.
//
// Starting from a seed reference it fetches a page, extracts the next
// reference and its label, records the step, and keeps going until the
// chain's depth limit or a stop request. Many chains run at once on a fixed
// pool of workers.
//
// Modules, leaves first:
// - chain: Job and VisitedRecord values
// - error: the error taxonomy
// - fetch / parse / store: the collaborators the core is handed
// - dispatch: job queue, workers, store relay, stop/shutdown coordinator
// - api / cli: the outer surfaces used by main.rs
// =============================================================================

pub mod api;
pub mod chain;
pub mod cli;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod parse;
pub mod store;
