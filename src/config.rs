//! Configuration file parser for newswire.toml.
//!
//! Destinations (channel + language + feed list) are static: loaded once
//! at startup, validated, and never mutated at runtime. The bot token is
//! deliberately NOT part of the file; it comes from the
//! `TELEGRAM_BOT_TOKEN` environment variable and its absence is a fatal
//! startup error.
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Bot credential missing at startup. Unrecoverable.
    #[error("Bot token not found: set the {0} environment variable")]
    MissingToken(&'static str),
}

// ============================================================================
// Language
// ============================================================================

/// Validated language tag (e.g. "EN", "RU").
///
/// Stored uppercased so that callback payloads and config keys compare
/// consistently. Construction is the only way in; free-form strings from
/// the bot surface go through [`Config::destination_for`] and unknown
/// tags are rejected there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Language(String);

impl Language {
    pub fn new(tag: &str) -> Result<Self, ConfigError> {
        let tag = tag.trim();
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::Invalid(format!(
                "language tag must be non-empty ASCII letters, got {:?}",
                tag
            )));
        }
        Ok(Language(tag.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Language {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Language::new(&value)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// One feed URL within a destination, with a human-readable source label.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSource {
    pub url: String,
    pub source: String,
}

/// A configured output channel bound to one language and its feed list.
#[derive(Debug, Clone, Deserialize)]
pub struct Destination {
    /// Channel handle the bot posts to, e.g. "@worldnews_en".
    pub channel: String,
    pub language: Language,
    pub feeds: Vec<FeedSource>,
}

/// Top-level application configuration.
///
/// Interval fields use `#[serde(default)]` so any subset of keys can be
/// specified; destinations are mandatory.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Seconds to sleep between full poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Freshness window: an article older than this at check time is not
    /// dispatched by the scheduled path.
    #[serde(default = "default_freshness_window")]
    pub freshness_window_secs: u64,

    /// Supervisor cooldown before restarting a crashed poll loop.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    pub destinations: Vec<Destination>,
}

fn default_poll_interval() -> u64 {
    15
}

fn default_freshness_window() -> u64 {
    120
}

fn default_cooldown() -> u64 {
    5
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const TOKEN_ENV: &'static str = "TELEGRAM_BOT_TOKEN";

    /// Load and validate configuration from a TOML file.
    ///
    /// Unlike an optional preferences file, a missing or invalid config is
    /// an error here: without destinations there is nothing to run.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid slurping a corrupted or
        // maliciously large file into memory.
        let meta = std::fs::metadata(path)?;
        if meta.len() > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "Config file is {} bytes (max {} bytes)",
                meta.len(),
                Self::MAX_FILE_SIZE
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;

        tracing::info!(
            path = %path.display(),
            destinations = config.destinations.len(),
            poll_interval_secs = config.poll_interval_secs,
            "Loaded configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.destinations.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one [[destinations]] entry is required".into(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be greater than zero".into(),
            ));
        }

        let mut seen_languages = std::collections::HashSet::new();
        for dest in &self.destinations {
            if dest.channel.is_empty() {
                return Err(ConfigError::Invalid("destination channel is empty".into()));
            }
            if !seen_languages.insert(&dest.language) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate destination language {}",
                    dest.language
                )));
            }
            if dest.feeds.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "destination {} has no feeds",
                    dest.channel
                )));
            }
            for feed in &dest.feeds {
                url::Url::parse(&feed.url).map_err(|e| {
                    ConfigError::Invalid(format!("invalid feed url {:?}: {}", feed.url, e))
                })?;
            }
        }
        Ok(())
    }

    /// Look up the destination configured for a language tag.
    ///
    /// This is the boundary where free-form language strings from the bot
    /// surface are rejected: `None` means the tag is not configured.
    pub fn destination_for(&self, language: &str) -> Option<&Destination> {
        let language = Language::new(language).ok()?;
        self.destinations.iter().find(|d| d.language == language)
    }

    /// Read the bot token from the environment. Missing or empty is fatal.
    pub fn bot_token() -> Result<SecretString, ConfigError> {
        match std::env::var(Self::TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => Ok(SecretString::from(token)),
            _ => Err(ConfigError::MissingToken(Self::TOKEN_ENV)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
