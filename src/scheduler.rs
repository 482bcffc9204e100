//! The poll scheduler: the long-lived loop driving fetch → filter → dispatch.
//!
//! Each cycle walks the configured destinations in order. A fault inside
//! one destination's processing is caught at the per-destination boundary
//! so no destination can block the others beyond its own fetch timeouts.
//! The loop itself runs under [`supervise`], which restarts it after a
//! cooldown if it ever dies; the process never exits on a loop fault.

use crate::config::{Config, Destination};
use crate::dedup::DedupStore;
use crate::dispatch::{dispatch_batch, format_article};
use crate::feed::fetch_feed;
use crate::filter::fresh_articles;
use crate::telegram::{ChatTarget, Telegram};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub struct Scheduler {
    config: Arc<Config>,
    client: reqwest::Client,
    telegram: Arc<Telegram>,
    dedup: Arc<DedupStore>,
    /// Log what would be sent instead of sending it.
    dry_run: bool,
}

impl Scheduler {
    pub fn new(
        config: Arc<Config>,
        client: reqwest::Client,
        telegram: Arc<Telegram>,
        dedup: Arc<DedupStore>,
        dry_run: bool,
    ) -> Self {
        Self {
            config,
            client,
            telegram,
            dedup,
            dry_run,
        }
    }

    /// One full pass over all destinations.
    pub async fn run_cycle(&self) {
        for destination in &self.config.destinations {
            if let Err(e) = self.process_destination(destination).await {
                // Per-destination boundary: log and move on to the next one
                tracing::error!(
                    channel = %destination.channel,
                    error = %e,
                    "Destination processing failed, continuing with next destination"
                );
            }
        }
    }

    /// Fetch → filter → dispatch for one destination.
    async fn process_destination(&self, destination: &Destination) -> anyhow::Result<()> {
        tracing::debug!(
            channel = %destination.channel,
            language = %destination.language,
            feeds = destination.feeds.len(),
            "Polling destination"
        );

        let mut articles = Vec::new();
        for feed in &destination.feeds {
            // fetch_feed degrades to empty on failure, so one dead feed
            // never shadows its siblings
            let mut fetched = fetch_feed(&self.client, &feed.url).await;
            tracing::debug!(source = %feed.source, entries = fetched.len(), "Fetched feed");
            articles.append(&mut fetched);
        }

        let window = chrono::Duration::seconds(self.config.freshness_window_secs as i64);
        let fresh = fresh_articles(
            articles,
            &self.dedup,
            &destination.language,
            Utc::now(),
            window,
        );

        if fresh.is_empty() {
            tracing::debug!(channel = %destination.channel, "No new articles");
            return Ok(());
        }

        let channel = ChatTarget::from(destination.channel.as_str());
        let delivered = if self.dry_run {
            for article in &fresh {
                tracing::info!(
                    channel = %channel,
                    message = %format_article(article),
                    "Dry run, would post"
                );
            }
            0
        } else {
            dispatch_batch(&self.telegram, &channel, &fresh).await
        };

        tracing::info!(
            channel = %destination.channel,
            fresh = fresh.len(),
            delivered = delivered,
            seen_total = self.dedup.len(&destination.language),
            "Cycle complete for destination"
        );
        Ok(())
    }

    /// Run cycles forever, sleeping the configured interval between them.
    pub async fn run_loop(&self) {
        let interval = Duration::from_secs(self.config.poll_interval_secs);
        loop {
            self.run_cycle().await;
            tokio::time::sleep(interval).await;
        }
    }

    /// Spawn the poll loop under the supervisor. Never returns.
    pub async fn run_supervised(self: Arc<Self>) {
        let cooldown = Duration::from_secs(self.config.cooldown_secs);
        let scheduler = Arc::clone(&self);
        supervise(
            move || {
                let scheduler = Arc::clone(&scheduler);
                async move { scheduler.run_loop().await }
            },
            cooldown,
        )
        .await
    }
}

/// Restart `make_loop`'s future whenever it ends, waiting `cooldown`
/// between incarnations.
///
/// The loop body is expected to run forever; both a panic and a voluntary
/// return count as faults. Running the body as its own task keeps a panic
/// from unwinding through the caller.
pub async fn supervise<F, Fut>(make_loop: F, cooldown: Duration)
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        let handle = tokio::spawn(make_loop());
        match handle.await {
            Ok(()) => {
                tracing::error!("Poll loop exited unexpectedly, restarting after cooldown");
            }
            Err(e) if e.is_panic() => {
                tracing::error!(error = %e, "Poll loop panicked, restarting after cooldown");
            }
            Err(e) => {
                tracing::error!(error = %e, "Poll loop task failed, restarting after cooldown");
            }
        }
        tokio::time::sleep(cooldown).await;
    }
}
