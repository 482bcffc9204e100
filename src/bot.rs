//! Telegram command/callback surface.
//!
//! A thin long-polling loop that translates bot updates into the two
//! reactive entry points of the session manager: language selection and
//! cancellation. Everything here is best-effort; an error talking to the
//! API is logged and the loop keeps polling.

use crate::config::Config;
use crate::session::SessionManager;
use crate::telegram::{
    CallbackQuery, ChatTarget, InlineKeyboardMarkup, Message, Telegram, Update,
};
use std::sync::Arc;
use std::time::Duration;

/// Server-side long-poll timeout for getUpdates.
const POLL_TIMEOUT_SECS: u64 = 30;
/// Pause after a failed getUpdates call before polling again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

const LANGUAGE_PREFIX: &str = "lang_";
const CANCEL_DATA: &str = "cancel";

pub struct Bot {
    config: Arc<Config>,
    telegram: Arc<Telegram>,
    session: Arc<SessionManager>,
}

impl Bot {
    pub fn new(
        config: Arc<Config>,
        telegram: Arc<Telegram>,
        session: Arc<SessionManager>,
    ) -> Self {
        Self {
            config,
            telegram,
            session,
        }
    }

    /// Poll for updates forever. Never returns.
    pub async fn run(&self) {
        let mut offset: Option<i64> = None;

        loop {
            match self.telegram.get_updates(offset, POLL_TIMEOUT_SECS).await {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.handle_update(update).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "getUpdates failed, retrying");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }
    }

    pub async fn handle_update(&self, update: Update) {
        if let Some(message) = update.message {
            self.handle_message(message).await;
        } else if let Some(callback) = update.callback_query {
            self.handle_callback(callback).await;
        }
    }

    async fn handle_message(&self, message: Message) {
        let Some(text) = message.text.as_deref() else {
            return;
        };

        if text == "/start" || text == "/language" {
            let keyboard = InlineKeyboardMarkup::rows(self.config.destinations.iter().map(|d| {
                (
                    d.language.as_str().to_string(),
                    format!("{}{}", LANGUAGE_PREFIX, d.language),
                )
            }));
            if let Err(e) = self
                .telegram
                .send_message_with_keyboard(
                    &ChatTarget::Id(message.chat.id),
                    "Choose the language for the news feed:",
                    &keyboard,
                )
                .await
            {
                tracing::warn!(chat_id = message.chat.id, error = %e, "Failed to send language menu");
            }
        }
    }

    async fn handle_callback(&self, callback: CallbackQuery) {
        let Some(chat_id) = callback.message.as_ref().map(|m| m.chat.id) else {
            tracing::debug!(callback_id = %callback.id, "Callback without originating message");
            return;
        };
        let data = callback.data.as_deref().unwrap_or_default();

        if let Some(language) = data.strip_prefix(LANGUAGE_PREFIX) {
            self.handle_language_choice(&callback.id, chat_id, language)
                .await;
        } else if data == CANCEL_DATA {
            self.handle_cancel(&callback.id, chat_id).await;
        } else {
            // Unknown payload: acknowledge so the client stops spinning
            let _ = self.telegram.answer_callback_query(&callback.id, None).await;
        }
    }

    async fn handle_language_choice(&self, callback_id: &str, chat_id: i64, language: &str) {
        match self.session.on_language_selected(chat_id, language) {
            Ok(()) => {
                let _ = self.telegram.answer_callback_query(callback_id, None).await;
                let keyboard = InlineKeyboardMarkup::rows([(
                    "Cancel".to_string(),
                    CANCEL_DATA.to_string(),
                )]);
                let text = format!(
                    "You chose {}. Posting the latest news in {} shortly.",
                    language.to_ascii_uppercase(),
                    language.to_ascii_uppercase()
                );
                if let Err(e) = self
                    .telegram
                    .send_message_with_keyboard(&ChatTarget::Id(chat_id), &text, &keyboard)
                    .await
                {
                    tracing::warn!(chat_id, error = %e, "Failed to send selection confirmation");
                }
            }
            Err(e) => {
                tracing::warn!(chat_id, language, "Rejected unconfigured language");
                let _ = self
                    .telegram
                    .answer_callback_query(callback_id, Some(&e.to_string()))
                    .await;
            }
        }
    }

    async fn handle_cancel(&self, callback_id: &str, chat_id: i64) {
        if self.session.on_cancel(chat_id) {
            let _ = self
                .telegram
                .answer_callback_query(callback_id, Some("Posting cancelled!"))
                .await;
        } else {
            let _ = self.telegram.answer_callback_query(callback_id, None).await;
        }
    }
}
