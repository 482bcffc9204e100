//! Article formatting and delivery to a destination channel.
//!
//! Delivery failures are isolated per article: one rejected send is
//! logged and skipped, and the rest of the batch still goes out. There is
//! no retry at this layer — a transiently failed delivery is simply
//! dropped, which is an accepted limitation of the scheduled path.

use crate::feed::Article;
use crate::telegram::{ChatTarget, ParseMode, Telegram};

/// Render the fixed two-line channel message: title, then a read-more link.
///
/// Title and link are HTML-escaped for Telegram's HTML parse mode; an
/// unescaped `<` in a headline would otherwise reject the whole send.
pub fn format_article(article: &Article) -> String {
    format!(
        "📰 {}\n<a href=\"{}\">Read more</a>",
        escape_html(&article.title),
        escape_html(&article.link)
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Deliver a batch of articles to a channel, one message per article.
///
/// Returns the number of successfully delivered articles. Sends are
/// sequential so the channel receives them in filter order.
pub async fn dispatch_batch(
    telegram: &Telegram,
    channel: &ChatTarget,
    articles: &[Article],
) -> usize {
    let mut delivered = 0;

    for article in articles {
        let text = format_article(article);
        match telegram.send_message(channel, &text, ParseMode::Html).await {
            Ok(_) => {
                tracing::info!(channel = %channel, link = %article.link, "Posted article");
                delivered += 1;
            }
            Err(e) => {
                tracing::warn!(
                    channel = %channel,
                    link = %article.link,
                    error = %e,
                    "Failed to deliver article, continuing batch"
                );
            }
        }
    }

    delivered
}
