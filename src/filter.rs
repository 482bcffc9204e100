//! Freshness filtering for the scheduled poll path.
//!
//! An article passes when it was published within the freshness window
//! before `now` (inclusive at the boundary) and its link has not been
//! dispatched for this language before. Accepted links are marked seen in
//! the same test-and-mark lock acquisition, which makes acceptance the
//! dedup commit point: marking happens before the actual send. See the
//! note in [`crate::dedup`] for the trade-off this carries.

use crate::config::Language;
use crate::dedup::DedupStore;
use crate::feed::Article;
use chrono::{DateTime, Duration, Utc};

/// Select the articles worth dispatching and mark them as seen.
///
/// Articles without a parseable publication timestamp are skipped with a
/// per-item warning; a bad item never aborts the batch. Input order is
/// preserved in the output.
pub fn fresh_articles(
    articles: Vec<Article>,
    dedup: &DedupStore,
    language: &Language,
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<Article> {
    articles
        .into_iter()
        .filter(|article| {
            let Some(published) = article.published else {
                tracing::warn!(
                    link = %article.link,
                    "Article has no parseable publish date, skipping"
                );
                return false;
            };

            // Both sides are UTC; future-dated items (clock skew on the
            // publisher side) count as age zero and pass the window check.
            let age = now.signed_duration_since(published);
            if age > window {
                return false;
            }

            dedup.check_and_mark(language, &article.link)
        })
        .collect()
}
