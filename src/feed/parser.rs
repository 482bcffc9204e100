use anyhow::Result;
use chrono::{DateTime, Utc};
use feed_rs::parser;

/// A single article extracted from a feed.
///
/// Transient: articles live only for the poll cycle that produced them.
/// The link doubles as the article's identity for deduplication, so an
/// entry without a link is dropped at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// Canonical link, used as the dedup identity.
    pub link: String,
    /// Entry title, "Untitled" when the feed omits one.
    pub title: String,
    /// Publication timestamp, normalized to UTC by feed-rs.
    /// `None` when the feed carried no parseable date.
    pub published: Option<DateTime<Utc>>,
}

/// Parse a raw feed body (RSS or Atom) into articles.
///
/// Entries without a link cannot be deduplicated and are dropped with a
/// per-item warning. Unparseable publication dates surface as
/// `published: None` and are left for the freshness filter to decide on.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<Article>> {
    let feed = parser::parse(bytes)?;

    let articles: Vec<Article> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
                tracing::warn!(entry_id = %entry.id, "Feed entry has no link, skipping");
                return None;
            };
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());
            let published = entry.published.or(entry.updated);

            Some(Article {
                link,
                title,
                published,
            })
        })
        .collect();

    Ok(articles)
}
