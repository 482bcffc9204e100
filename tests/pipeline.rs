//! Integration tests for the poll pipeline: fetch → filter → dispatch.
//!
//! Each test stands up two wiremock servers, one serving RSS bodies and
//! one impersonating the Telegram Bot API, and drives the scheduler
//! through explicit cycles. Mock expectations double as dispatch-count
//! assertions: they are verified when the servers drop.

use chrono::{Duration as ChronoDuration, Utc};
use newswire::config::Config;
use newswire::dedup::DedupStore;
use newswire::scheduler::Scheduler;
use newswire::telegram::Telegram;
use secrecy::SecretString;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss_feed(items: &[(&str, chrono::DateTime<Utc>)]) -> String {
    let items: String = items
        .iter()
        .map(|(link, published)| {
            format!(
                "<item><title>Item</title><link>{}</link><pubDate>{}</pubDate></item>",
                link,
                published.to_rfc2822()
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel>{}</channel></rss>"#,
        items
    )
}

fn config_with_feeds(feed_urls: &[&str]) -> Arc<Config> {
    let feeds: String = feed_urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            format!(
                "  [[destinations.feeds]]\n  url = \"{}\"\n  source = \"Feed{}\"\n",
                url, i
            )
        })
        .collect();
    let toml = format!(
        r#"
freshness_window_secs = 120

[[destinations]]
channel = "@news_en"
language = "EN"

{feeds}
"#
    );
    Arc::new(toml::from_str(&toml).unwrap())
}

fn ok_send_body() -> serde_json::Value {
    serde_json::json!({
        "ok": true,
        "result": { "message_id": 1, "chat": { "id": 1 } }
    })
}

fn scheduler(config: Arc<Config>, telegram_server: &MockServer) -> Scheduler {
    let client = reqwest::Client::new();
    let telegram = Arc::new(
        Telegram::new(client.clone(), SecretString::from("t:1"))
            .with_base_url(telegram_server.uri()),
    );
    Scheduler::new(config, client, telegram, Arc::new(DedupStore::new()), false)
}

#[tokio::test]
async fn test_same_link_across_cycles_dispatched_once() {
    let feeds = MockServer::start().await;
    let tg = MockServer::start().await;

    let body = rss_feed(&[("https://example.com/story", Utc::now())]);
    Mock::given(method("GET"))
        .and(path_regex("^/rss$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&feeds)
        .await;

    // The same article appears in both cycles but may be sent only once
    Mock::given(method("POST"))
        .and(path_regex(".*/sendMessage$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_send_body()))
        .expect(1)
        .mount(&tg)
        .await;

    let config = config_with_feeds(&[&format!("{}/rss", feeds.uri())]);
    let scheduler = scheduler(config, &tg);

    scheduler.run_cycle().await;
    scheduler.run_cycle().await;
}

#[tokio::test]
async fn test_stale_articles_not_dispatched() {
    let feeds = MockServer::start().await;
    let tg = MockServer::start().await;

    let now = Utc::now();
    let body = rss_feed(&[
        ("https://example.com/fresh", now - ChronoDuration::minutes(1)),
        ("https://example.com/stale", now - ChronoDuration::minutes(10)),
    ]);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&feeds)
        .await;

    // Only the minute-old article makes it through the 2 minute window
    Mock::given(method("POST"))
        .and(path_regex(".*/sendMessage$"))
        .and(body_partial_json(serde_json::json!({
            "chat_id": "@news_en",
            "text": "📰 Item\n<a href=\"https://example.com/fresh\">Read more</a>",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_send_body()))
        .expect(1)
        .mount(&tg)
        .await;

    let config = config_with_feeds(&[&format!("{}/rss", feeds.uri())]);
    scheduler(config, &tg).run_cycle().await;
}

#[tokio::test]
async fn test_failing_feed_does_not_affect_sibling() {
    let feeds = MockServer::start().await;
    let tg = MockServer::start().await;

    // First feed 404s (fails fast, no retries); second serves one article
    Mock::given(method("GET"))
        .and(path_regex("^/broken$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&feeds)
        .await;
    let body = rss_feed(&[("https://example.com/ok", Utc::now())]);
    Mock::given(method("GET"))
        .and(path_regex("^/healthy$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&feeds)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(".*/sendMessage$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_send_body()))
        .expect(1)
        .mount(&tg)
        .await;

    let config = config_with_feeds(&[
        &format!("{}/broken", feeds.uri()),
        &format!("{}/healthy", feeds.uri()),
    ]);
    scheduler(config, &tg).run_cycle().await;
}

#[tokio::test]
async fn test_delivery_failure_isolated_within_batch() {
    let feeds = MockServer::start().await;
    let tg = MockServer::start().await;

    let now = Utc::now();
    let body = rss_feed(&[
        ("https://example.com/1", now),
        ("https://example.com/2", now),
        ("https://example.com/3", now),
    ]);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&feeds)
        .await;

    // The second article's send is rejected; the other two still go out
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "text": "📰 Item\n<a href=\"https://example.com/2\">Read more</a>",
        })))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "ok": false,
            "description": "Bad Request: not enough rights"
        })))
        .expect(1)
        .mount(&tg)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(".*/sendMessage$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_send_body()))
        .expect(2)
        .mount(&tg)
        .await;

    let config = config_with_feeds(&[&format!("{}/rss", feeds.uri())]);
    scheduler(config, &tg).run_cycle().await;
}

#[tokio::test]
async fn test_failed_delivery_not_retried_next_cycle() {
    // Once a link is accepted by the filter it is marked seen, so a
    // delivery failure in cycle one is NOT retried in cycle two. This is
    // the documented mark-before-send trade-off.
    let feeds = MockServer::start().await;
    let tg = MockServer::start().await;

    let body = rss_feed(&[("https://example.com/doomed", Utc::now())]);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&feeds)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(".*/sendMessage$"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "ok": false,
            "description": "Bad Request: chat not found"
        })))
        .expect(1)
        .mount(&tg)
        .await;

    let config = config_with_feeds(&[&format!("{}/rss", feeds.uri())]);
    let scheduler = scheduler(config, &tg);
    scheduler.run_cycle().await;
    scheduler.run_cycle().await;
}

#[tokio::test]
async fn test_dry_run_sends_nothing() {
    let feeds = MockServer::start().await;
    let tg = MockServer::start().await;

    let body = rss_feed(&[("https://example.com/quiet", Utc::now())]);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&feeds)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_send_body()))
        .expect(0)
        .mount(&tg)
        .await;

    let config = config_with_feeds(&[&format!("{}/rss", feeds.uri())]);
    let client = reqwest::Client::new();
    let telegram = Arc::new(
        Telegram::new(client.clone(), SecretString::from("t:1")).with_base_url(tg.uri()),
    );
    let scheduler = Scheduler::new(config, client, telegram, Arc::new(DedupStore::new()), true);
    scheduler.run_cycle().await;
}
