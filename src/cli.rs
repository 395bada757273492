// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Every setting can come from three places, highest priority first:
// 1. A command-line flag (--workers 8)
// 2. An environment variable (CHAINWALK_WORKERS=8)
// 3. A .env file, loaded into the environment by main() before parsing
//
// Subcommands:
// - serve: run the dispatcher behind an HTTP API until stopped
// - follow: walk a few seeds once, print what happened, exit
// =============================================================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::dispatch::DispatcherConfig;
use crate::error::ConfigError;
use crate::store::StoreSettings;

#[derive(Parser, Debug)]
#[command(
    name = "chainwalk",
    version = "0.1.0",
    about = "Follows chains of linked pages and records every step",
    long_about = "chainwalk starts from seed references, repeatedly fetches a page, extracts the \
                  next reference and its title, records the step, and keeps going until the \
                  depth limit or a stop request."
)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the dispatcher and accept seeds over HTTP
    ///
    /// Example: chainwalk serve --bind 0.0.0.0:8080
    Serve {
        /// Address to bind the HTTP API to (host:port)
        #[arg(long, env = "CHAINWALK_BIND", default_value = "127.0.0.1:8080")]
        bind: String,
    },

    /// Follow the given seeds to the depth limit, then print a summary
    ///
    /// Example: chainwalk follow /watch?v=DT61L8hbbJ4 --depth 5
    Follow {
        /// Seed references, resolved against --base-url
        #[arg(required = true)]
        seeds: Vec<String>,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Settings shared by both subcommands.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Number of workers draining the job queue
    #[arg(long, global = true, env = "CHAINWALK_WORKERS", default_value_t = 5)]
    pub workers: usize,

    /// Depth limit for chains submitted without one
    #[arg(long, global = true, env = "CHAINWALK_DEPTH", default_value_t = 10)]
    pub depth: u32,

    /// Origin that every reference is resolved against
    #[arg(long, global = true, env = "CHAINWALK_BASE_URL", default_value = "https://www.youtube.com")]
    pub base_url: String,

    /// Slots in the job queue; also the maximum number of live chains
    #[arg(long, global = true, env = "CHAINWALK_QUEUE_CAPACITY", default_value_t = 500)]
    pub queue_capacity: usize,

    /// Slots between the workers and storage
    #[arg(long, global = true, env = "CHAINWALK_RELAY_CAPACITY", default_value_t = 500)]
    pub relay_capacity: usize,

    /// SQLite database URL (sqlite://path); falls back to --file-store
    #[arg(long, global = true, env = "CHAINWALK_DATABASE_URL")]
    pub database_url: Option<String>,

    /// File that receives one JSON line per visited record
    #[arg(long, global = true, env = "CHAINWALK_FILE_STORE", default_value = "chainwalk.jsonl")]
    pub file_store: PathBuf,

    /// Per-request fetch timeout in seconds
    #[arg(long, global = true, env = "CHAINWALK_FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "CHAINWALK_LOG_JSON")]
    pub log_json: bool,
}

impl Settings {
    /// Checks the values clap can't check on its own.
    pub fn dispatcher_config(&self, track_outcomes: bool) -> Result<DispatcherConfig, ConfigError> {
        at_least_one("workers", self.workers)?;
        at_least_one("depth", self.depth as usize)?;
        at_least_one("queue-capacity", self.queue_capacity)?;
        at_least_one("relay-capacity", self.relay_capacity)?;

        let base = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(self.base_url.clone()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }

        Ok(DispatcherConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            relay_capacity: self.relay_capacity,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            default_depth: self.depth,
            track_outcomes,
        })
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            database_url: self.database_url.clone(),
            file_path: self.file_store.clone(),
        }
    }

    pub fn fetch_timeout(&self) -> Result<Duration, ConfigError> {
        at_least_one("fetch-timeout-secs", self.fetch_timeout_secs as usize)?;
        Ok(Duration::from_secs(self.fetch_timeout_secs))
    }
}

fn at_least_one(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            name,
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}
