// src/main.rs
// =============================================================================
// This is the entry point of chainwalk.
//
// What happens here:
// 1. Load .env, parse command-line arguments using clap
// 2. Set up logging
// 3. Build the collaborators (fetcher, parser, storage) exactly once
// 4. Dispatch to the subcommand handler
// 5. Exit with proper code (0 = success, 1 = a chain aborted, 2 = error)
//
// Progress lines go to stderr; stdout only carries results, so
// `follow --json` can be piped straight into a JSON tool.
//
// Only configuration problems can end the process early. Once workers are
// running, failures stay inside the chain that hit them.
// =============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use chainwalk::api;
use chainwalk::cli::{Cli, Commands, Settings};
use chainwalk::dispatch::{ChainOutcome, ChainStatus, Dispatcher};
use chainwalk::fetch::HttpFetcher;
use chainwalk::parse::NextLinkParser;
use chainwalk::store::StoreTarget;

#[tokio::main]
async fn main() {
    // A missing .env is fine, the environment and defaults still apply
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.settings.log_json);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "fatal error");
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Serve { bind } => handle_serve(&cli.settings, &bind).await,
        Commands::Follow { seeds, json } => handle_follow(&cli.settings, &seeds, json).await,
    }
}

// Everything that can fail with a ConfigError happens here, before any
// worker exists
async fn start_dispatcher(settings: &Settings, track_outcomes: bool) -> Result<Dispatcher> {
    let config = settings
        .dispatcher_config(track_outcomes)
        .context("invalid configuration")?;
    let fetcher = HttpFetcher::new(settings.fetch_timeout()?).context("failed to build http client")?;
    let store = StoreTarget::decide(&settings.store_settings())
        .await
        .context("failed to open storage")?;

    eprintln!("📦 Storing visited records in {}", store.describe());
    eprintln!("👷 Starting {} worker(s)", config.workers);

    Ok(Dispatcher::start(
        config,
        Arc::new(fetcher),
        Arc::new(NextLinkParser::new()),
        store,
    ))
}

// Stops the dispatcher on ctrl-c
fn stop_on_ctrl_c(dispatcher: &Dispatcher) {
    let dispatcher = dispatcher.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n🛑 Interrupt received, stopping workers...");
            dispatcher.stop();
        }
    });
}

// Handles the 'serve' subcommand
async fn handle_serve(settings: &Settings, bind: &str) -> Result<i32> {
    let dispatcher = start_dispatcher(settings, false).await?;
    stop_on_ctrl_c(&dispatcher);

    // storage is closed even when the listener could not be bound
    api::serve_until_shutdown(dispatcher, bind).await?;
    eprintln!("✅ Server shut down");
    Ok(0)
}

// Handles the 'follow' subcommand
async fn handle_follow(settings: &Settings, seeds: &[String], json: bool) -> Result<i32> {
    let dispatcher = start_dispatcher(settings, true).await?;
    stop_on_ctrl_c(&dispatcher);

    eprintln!("🔗 Following {} chain(s) to depth {}", seeds.len(), settings.depth);

    let submissions = seeds.iter().map(|seed| {
        let dispatcher = dispatcher.clone();
        async move { (seed, dispatcher.submit(seed, None).await) }
    });
    for (seed, result) in futures::future::join_all(submissions).await {
        if let Err(e) = result {
            eprintln!("  Warning: seed '{}' not submitted: {}", seed, e);
        }
    }

    tokio::select! {
        _ = dispatcher.wait_idle() => {}
        _ = dispatcher.wait_shutdown() => {}
    }
    dispatcher.stop();
    dispatcher.wait_shutdown().await;

    let outcomes = dispatcher.outcomes();
    print_results(&outcomes, json)?;

    let stats = dispatcher.stats();
    if !json {
        println!("   💾 Records stored: {}", stats.records_stored);
        if stats.store_failures > 0 {
            println!("   ⚠️  Store failures: {}", stats.store_failures);
        }
    }

    if outcomes.iter().any(|o| !o.is_ok()) {
        Ok(1)
    } else {
        Ok(0)
    }
}

// Prints the outcomes either as a table or JSON
fn print_results(outcomes: &[ChainOutcome], json: bool) -> Result<()> {
    print!("{}", render_results(outcomes, json)?);
    Ok(())
}

fn render_results(outcomes: &[ChainOutcome], json: bool) -> Result<String> {
    if json {
        let json_output = serde_json::to_string_pretty(outcomes)?;
        Ok(format!("{}\n", json_output))
    } else {
        Ok(render_table(outcomes))
    }
}

fn render_table(outcomes: &[ChainOutcome]) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&format!("{:<30} {:<8} {:<15} {:<40}\n", "CHAIN", "DEPTH", "STATUS", "MESSAGE"));
    out.push_str(&format!("{}\n", "=".repeat(93)));

    for outcome in outcomes {
        let (status, message) = match &outcome.status {
            ChainStatus::Completed => ("✅ COMPLETE", ""),
            ChainStatus::Terminal => ("⏹️  TERMINAL", ""),
            ChainStatus::Aborted { reason } => ("❌ ABORTED", reason.as_str()),
        };

        // Truncate long ids for display
        let chain_display = if outcome.chain_id.chars().count() > 27 {
            format!("{}...", outcome.chain_id.chars().take(27).collect::<String>())
        } else {
            outcome.chain_id.clone()
        };

        out.push_str(&format!(
            "{:<30} {:<8} {:<15} {:<40}\n",
            chain_display, outcome.sequence, status, message
        ));
    }

    let ok_count = outcomes.iter().filter(|o| o.is_ok()).count();
    out.push('\n');
    out.push_str("📊 Summary:\n");
    out.push_str(&format!("   ✅ Completed: {}\n", ok_count));
    out.push_str(&format!("   ❌ Aborted: {}\n", outcomes.len() - ok_count));
    out.push_str(&format!("   📋 Total: {}\n", outcomes.len()));
    out
}
