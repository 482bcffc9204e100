//! Serde wire types for the subset of the Telegram Bot API we use.

use serde::{Deserialize, Serialize};

/// Bot API response envelope: `{ ok, result, description }`.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardMarkup {
    /// One button per row, in the given (label, callback_data) order.
    pub fn rows(buttons: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            inline_keyboard: buttons
                .into_iter()
                .map(|(text, callback_data)| {
                    vec![InlineKeyboardButton {
                        text,
                        callback_data,
                    }]
                })
                .collect(),
        }
    }
}

/// A message recipient: either a numeric chat id (private chats) or a
/// channel handle like "@worldnews_en".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    Id(i64),
    Handle(String),
}

impl ChatTarget {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ChatTarget::Id(id) => serde_json::json!(id),
            ChatTarget::Handle(handle) => serde_json::json!(handle),
        }
    }
}

impl From<i64> for ChatTarget {
    fn from(id: i64) -> Self {
        ChatTarget::Id(id)
    }
}

impl From<&str> for ChatTarget {
    fn from(handle: &str) -> Self {
        ChatTarget::Handle(handle.to_string())
    }
}

impl std::fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatTarget::Id(id) => write!(f, "{}", id),
            ChatTarget::Handle(handle) => f.write_str(handle),
        }
    }
}
