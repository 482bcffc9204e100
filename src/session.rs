//! Per-user interaction state for the on-demand "post latest" flow.
//!
//! When a user picks a language, a short grace timer starts; unless the
//! user cancels before it fires, the bot runs one fetch→dispatch pass for
//! that language's destination. The on-demand path intentionally bypasses
//! both the freshness filter and the dedup store: it answers "post the
//! latest news now", not "post what is new since last poll". Each feed's
//! contribution is capped so a single tap cannot flood the channel.
//!
//! At most one pending interaction exists per chat; a new selection
//! replaces the previous one (its timer is aborted), last-write-wins.

use crate::config::{Config, Destination};
use crate::dispatch::dispatch_batch;
use crate::feed::fetch_feed;
use crate::telegram::{ChatTarget, Telegram};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Grace period between language selection and the on-demand post.
pub const SELECTION_DELAY: Duration = Duration::from_secs(5);

/// Cap on articles taken per feed by the on-demand path.
const ON_DEMAND_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The language tag is not bound to any configured destination.
    #[error("No destination configured for language {0:?}")]
    UnknownLanguage(String),
}

struct PendingInteraction {
    /// Distinguishes this interaction from a later replacement so the
    /// timer task only cleans up its own map entry.
    generation: u64,
    cancelled: Arc<AtomicBool>,
    timer: JoinHandle<()>,
}

/// Tracks pending interactions and runs their delayed dispatch tasks.
pub struct SessionManager {
    config: Arc<Config>,
    client: reqwest::Client,
    telegram: Arc<Telegram>,
    delay: Duration,
    generation: AtomicU64,
    pending: Mutex<HashMap<i64, PendingInteraction>>,
}

impl SessionManager {
    pub fn new(config: Arc<Config>, client: reqwest::Client, telegram: Arc<Telegram>) -> Self {
        Self::with_delay(config, client, telegram, SELECTION_DELAY)
    }

    /// Like [`SessionManager::new`] with a custom grace period (tests).
    pub fn with_delay(
        config: Arc<Config>,
        client: reqwest::Client,
        telegram: Arc<Telegram>,
        delay: Duration,
    ) -> Self {
        Self {
            config,
            client,
            telegram,
            delay,
            generation: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// A user picked a language: schedule the delayed on-demand post.
    ///
    /// Unconfigured languages are rejected here, at the boundary. Any
    /// prior pending interaction for this chat is replaced and its timer
    /// aborted.
    pub fn on_language_selected(
        self: &Arc<Self>,
        chat_id: i64,
        language: &str,
    ) -> Result<(), SessionError> {
        let destination = self
            .config
            .destination_for(language)
            .ok_or_else(|| SessionError::UnknownLanguage(language.to_string()))?
            .clone();

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));

        // Lock before spawning so the timer task's cleanup (which takes
        // this same lock) cannot observe the map before the insert below
        let mut pending = self.pending.lock().expect("session lock poisoned");

        let manager = Arc::clone(self);
        let flag = Arc::clone(&cancelled);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(manager.delay).await;

            // The flag is checked at fire time; a cancel that landed
            // during the sleep turns this into a no-op
            if !flag.load(Ordering::SeqCst) {
                manager.post_latest(&destination).await;
            }

            let mut pending = manager.pending.lock().expect("session lock poisoned");
            if pending
                .get(&chat_id)
                .is_some_and(|p| p.generation == generation)
            {
                pending.remove(&chat_id);
            }
        });

        if let Some(previous) = pending.insert(
            chat_id,
            PendingInteraction {
                generation,
                cancelled,
                timer,
            },
        ) {
            tracing::debug!(chat_id, "Replacing earlier pending interaction");
            previous.timer.abort();
        }
        Ok(())
    }

    /// A user hit cancel. Returns true when a pending interaction was
    /// actually cancelled; a cancel with nothing pending is a no-op.
    pub fn on_cancel(&self, chat_id: i64) -> bool {
        let mut pending = self.pending.lock().expect("session lock poisoned");
        match pending.remove(&chat_id) {
            Some(interaction) => {
                interaction.cancelled.store(true, Ordering::SeqCst);
                interaction.timer.abort();
                tracing::info!(chat_id, "Pending post cancelled");
                true
            }
            None => {
                tracing::debug!(chat_id, "Cancel received with no pending interaction");
                false
            }
        }
    }

    pub fn has_pending(&self, chat_id: i64) -> bool {
        self.pending
            .lock()
            .expect("session lock poisoned")
            .contains_key(&chat_id)
    }

    /// One on-demand fetch→dispatch pass: latest entries per feed, capped,
    /// no freshness filter, no dedup.
    async fn post_latest(&self, destination: &Destination) {
        let channel = ChatTarget::from(destination.channel.as_str());
        for feed in &destination.feeds {
            let articles = fetch_feed(&self.client, &feed.url).await;
            let latest = &articles[..articles.len().min(ON_DEMAND_LIMIT)];
            let delivered = dispatch_batch(&self.telegram, &channel, latest).await;
            tracing::info!(
                channel = %destination.channel,
                source = %feed.source,
                delivered,
                "On-demand post complete for feed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS_ONE_ITEM: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><title>Latest</title><link>https://example.com/latest</link></item>
</channel></rss>"#;

    fn test_config(feed_url: &str) -> Arc<Config> {
        let toml = format!(
            r#"
[[destinations]]
channel = "@news_en"
language = "EN"

  [[destinations.feeds]]
  url = "{feed_url}"
  source = "Example"
"#
        );
        Arc::new(toml::from_str(&toml).unwrap())
    }

    async fn mount_feed(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path_regex("^/feed$"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS_ONE_ITEM))
            .mount(server)
            .await;
    }

    fn mock_send_message(expect: u64) -> Mock {
        Mock::given(method("POST"))
            .and(path_regex(".*/sendMessage$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "message_id": 1, "chat": { "id": 1 } }
            })))
            .expect(expect)
    }

    fn manager(server: &MockServer, delay: Duration) -> Arc<SessionManager> {
        let client = reqwest::Client::new();
        let telegram = Arc::new(
            Telegram::new(client.clone(), SecretString::from("t:1")).with_base_url(server.uri()),
        );
        Arc::new(SessionManager::with_delay(
            test_config(&format!("{}/feed", server.uri())),
            client,
            telegram,
            delay,
        ))
    }

    #[tokio::test]
    async fn test_unknown_language_rejected_at_boundary() {
        let server = MockServer::start().await;
        let manager = manager(&server, Duration::from_millis(50));

        let err = manager.on_language_selected(1, "DE").unwrap_err();
        assert!(matches!(err, SessionError::UnknownLanguage(_)));
        assert!(!manager.has_pending(1));
    }

    #[tokio::test]
    async fn test_timer_fires_and_posts_latest() {
        let server = MockServer::start().await;
        mount_feed(&server).await;
        mock_send_message(1).mount(&server).await;

        let manager = manager(&server, Duration::from_millis(50));
        manager.on_language_selected(1, "EN").unwrap();
        assert!(manager.has_pending(1));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!manager.has_pending(1)); // completed and cleaned up
    }

    #[tokio::test]
    async fn test_cancel_before_fire_suppresses_post() {
        let server = MockServer::start().await;
        mount_feed(&server).await;
        mock_send_message(0).mount(&server).await;

        let manager = manager(&server, Duration::from_millis(200));
        manager.on_language_selected(1, "EN").unwrap();
        assert!(manager.on_cancel(1));
        assert!(!manager.has_pending(1));

        // Well past the delay: nothing may have been sent
        tokio::time::sleep(Duration::from_millis(600)).await;
    }

    #[tokio::test]
    async fn test_cancel_after_fire_is_noop() {
        let server = MockServer::start().await;
        mount_feed(&server).await;
        mock_send_message(1).mount(&server).await;

        let manager = manager(&server, Duration::from_millis(50));
        manager.on_language_selected(1, "EN").unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!manager.on_cancel(1));
    }

    #[tokio::test]
    async fn test_cancel_without_pending_is_noop() {
        let server = MockServer::start().await;
        let manager = manager(&server, Duration::from_millis(50));
        assert!(!manager.on_cancel(99));
    }

    #[tokio::test]
    async fn test_new_selection_replaces_previous() {
        let server = MockServer::start().await;
        mount_feed(&server).await;
        // Only the replacement interaction fires
        mock_send_message(1).mount(&server).await;

        let manager = manager(&server, Duration::from_millis(200));
        manager.on_language_selected(1, "EN").unwrap();
        manager.on_language_selected(1, "EN").unwrap();
        assert!(manager.has_pending(1));

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(!manager.has_pending(1));
    }

    #[tokio::test]
    async fn test_interactions_are_per_chat() {
        let server = MockServer::start().await;
        mount_feed(&server).await;
        mock_send_message(1).mount(&server).await;

        let manager = manager(&server, Duration::from_millis(200));
        manager.on_language_selected(1, "EN").unwrap();
        manager.on_language_selected(2, "EN").unwrap();

        // Cancelling chat 2 leaves chat 1's interaction running
        assert!(manager.on_cancel(2));
        assert!(manager.has_pending(1));

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(!manager.has_pending(1));
    }
}
