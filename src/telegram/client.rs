use crate::telegram::types::{
    ApiResponse, ChatTarget, InlineKeyboardMarkup, Message, Update,
};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// Timeout for ordinary API calls.
const CALL_TIMEOUT: Duration = Duration::from_secs(20);
/// Extra headroom on top of the server-side long-poll timeout.
const LONG_POLL_SLACK: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The API answered with `ok: false`.
    #[error("Telegram API error: {0}")]
    Api(String),
    #[error("Failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Message text markup accepted by `send_message`.
#[derive(Debug, Clone, Copy)]
pub enum ParseMode {
    Html,
}

impl ParseMode {
    fn as_str(self) -> &'static str {
        match self {
            ParseMode::Html => "HTML",
        }
    }
}

/// Thin Telegram Bot API client.
///
/// The token travels only inside the request URL, as the Bot API
/// requires; it is held as a [`SecretString`] and masked in Debug output
/// so it can never leak through logs. `base_url` is overridable so tests
/// can point the client at a wiremock server.
pub struct Telegram {
    client: reqwest::Client,
    token: SecretString,
    base_url: String,
}

impl std::fmt::Debug for Telegram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telegram")
            .field("token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Telegram {
    pub fn new(client: reqwest::Client, token: SecretString) -> Self {
        Self {
            client,
            token,
            base_url: "https://api.telegram.org".to_string(),
        }
    }

    /// Point the client at a different API host (tests only).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send a text message to a chat or channel.
    pub async fn send_message(
        &self,
        chat: &ChatTarget,
        text: &str,
        parse_mode: ParseMode,
    ) -> Result<Message, TelegramError> {
        let payload = serde_json::json!({
            "chat_id": chat.to_json(),
            "text": text,
            "parse_mode": parse_mode.as_str(),
        });
        self.call("sendMessage", &payload, CALL_TIMEOUT).await
    }

    /// Send a text message with an inline keyboard attached.
    pub async fn send_message_with_keyboard(
        &self,
        chat: &ChatTarget,
        text: &str,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<Message, TelegramError> {
        let payload = serde_json::json!({
            "chat_id": chat.to_json(),
            "text": text,
            "reply_markup": keyboard,
        });
        self.call("sendMessage", &payload, CALL_TIMEOUT).await
    }

    /// Long-poll for updates past `offset`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let payload = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        self.call(
            "getUpdates",
            &payload,
            Duration::from_secs(timeout_secs) + LONG_POLL_SLACK,
        )
        .await
    }

    /// Acknowledge a callback query, optionally with a toast text.
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<bool, TelegramError> {
        let payload = serde_json::json!({
            "callback_query_id": callback_query_id,
            "text": text,
        });
        self.call("answerCallbackQuery", &payload, CALL_TIMEOUT).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T, TelegramError> {
        let url = format!(
            "{}/bot{}/{}",
            self.base_url,
            self.token.expose_secret(),
            method
        );

        let response = tokio::time::timeout(timeout, self.client.post(&url).json(payload).send())
            .await
            .map_err(|_| TelegramError::Timeout)?
            .map_err(TelegramError::Network)?;

        // The Bot API reports errors both in the status code and in the
        // envelope; prefer the envelope's description when we can get it.
        let status = response.status();
        let body = response.bytes().await.map_err(TelegramError::Network)?;

        let envelope: ApiResponse<T> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(TelegramError::HttpStatus(status.as_u16()));
            }
            Err(e) => return Err(TelegramError::Decode(e)),
        };

        if !envelope.ok {
            return Err(TelegramError::Api(
                envelope
                    .description
                    .unwrap_or_else(|| format!("status {}", status.as_u16())),
            ));
        }
        envelope
            .result
            .ok_or_else(|| TelegramError::Api("ok response with no result".to_string()))
    }
}
