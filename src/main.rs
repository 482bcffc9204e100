use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use newswire::bot::Bot;
use newswire::config::Config;
use newswire::dedup::DedupStore;
use newswire::scheduler::Scheduler;
use newswire::session::SessionManager;
use newswire::telegram::Telegram;

#[derive(Parser, Debug)]
#[command(name = "newswire", about = "Telegram news relay for RSS feeds")]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "newswire.toml")]
    config: PathBuf,

    /// Fetch and filter, but log instead of posting
    #[arg(long)]
    dry_run: bool,

    /// Run a single poll cycle and exit (no bot surface)
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = Arc::new(
        Config::load(&args.config)
            .with_context(|| format!("Failed to load config from {}", args.config.display()))?,
    );

    // Missing credential aborts startup; everything past this point
    // recovers locally instead of crashing the process
    let token = Config::bot_token().context("Cannot start without a bot token")?;

    let client = reqwest::Client::new();
    let telegram = Arc::new(Telegram::new(client.clone(), token));
    let dedup = Arc::new(DedupStore::new());

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&config),
        client.clone(),
        Arc::clone(&telegram),
        Arc::clone(&dedup),
        args.dry_run,
    ));

    if args.once {
        scheduler.run_cycle().await;
        return Ok(());
    }

    let session = Arc::new(SessionManager::new(
        Arc::clone(&config),
        client,
        Arc::clone(&telegram),
    ));
    let bot = Bot::new(Arc::clone(&config), telegram, session);

    tracing::info!(
        destinations = config.destinations.len(),
        poll_interval_secs = config.poll_interval_secs,
        "Starting newswire"
    );

    // The poll loop runs supervised on its own task; the bot's update
    // loop runs on this one. Neither ever returns.
    tokio::spawn(scheduler.run_supervised());
    bot.run().await;

    Ok(())
}
