//! Thin Telegram Bot API client and its wire types.
//!
//! Only the methods this binary needs: `sendMessage`, `getUpdates`, and
//! `answerCallbackQuery`. The base URL is overridable so tests can run
//! against a mock server.

mod client;
mod types;

pub use client::{ParseMode, Telegram, TelegramError};
pub use types::{
    ApiResponse, CallbackQuery, Chat, ChatTarget, InlineKeyboardButton, InlineKeyboardMarkup,
    Message, Update,
};
