//! newswire: a Telegram news relay.
//!
//! Polls configured RSS feeds on a fixed cadence, filters articles down
//! to ones published within a short freshness window that have not been
//! posted before, and forwards them to per-language Telegram channels.
//! A small interactive bot surface lets users trigger an on-demand
//! "post the latest" pass with a cancellation grace period.

pub mod bot;
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod feed;
pub mod filter;
pub mod scheduler;
pub mod session;
pub mod telegram;
