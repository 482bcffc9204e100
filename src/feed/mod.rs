//! Feed retrieval: HTTP fetching with retry and RSS/Atom parsing.
//!
//! - [`parser`] - Low-level feed parsing using the `feed-rs` crate
//! - [`fetcher`] - HTTP fetching with timeout, backoff, and degraded-empty results
//!
//! The fetcher never returns an error: a feed that cannot be fetched or
//! parsed yields an empty article list, so a broken feed degrades its own
//! output without propagating a fault into the poll cycle.

mod fetcher;
mod parser;

pub use fetcher::fetch_feed;
pub use parser::{parse_feed, Article};
