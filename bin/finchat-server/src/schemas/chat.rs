//! Request / response bodies for the `/api/chats` endpoints.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::entities::{ChatMessage, ChatSummary, DISPLAY_TIMESTAMP_FORMAT};
use crate::error::ServerError;

// ── Requests ──────────────────────────────────────────────────────────────────

/// Body of `POST /api/chats/start`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StartChatRequest {
    /// Integer id of an existing user; a numeric string is accepted too.
    #[schema(value_type = Option<i64>)]
    #[serde(default)]
    pub user_id: Option<Value>,
}

/// Body of `POST /api/chats/{chat_id}/message`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    #[schema(value_type = Option<i64>)]
    #[serde(default)]
    pub user_id: Option<Value>,
    /// The user's line of conversation.
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `POST /api/chats/{chat_id}/end`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EndChatRequest {
    #[schema(value_type = Option<i64>)]
    #[serde(default)]
    pub user_id: Option<Value>,
}

/// Query string of the read endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Integer id of the caller.
    pub user_id: Option<String>,
}

// ── Responses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartChatResponse {
    pub chat_id: String,
    /// The greeting stored as the chat's first message.
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendMessageResponse {
    /// Id of the stored assistant reply.
    pub message_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EndChatResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatSummaryResponse {
    pub chat_id: String,
    pub title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_active: bool,
    /// Content of the newest message, `null` for an empty chat.
    pub last_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatListResponse {
    pub chats: Vec<ChatSummaryResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message_id: String,
    pub content: String,
    pub is_user_message: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatHistoryResponse {
    pub chat_id: String,
    pub title: Option<String>,
    pub is_active: bool,
    pub messages: Vec<MessageResponse>,
}

pub fn display_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(DISPLAY_TIMESTAMP_FORMAT).to_string()
}

impl ChatSummary {
    pub fn to_response(&self) -> ChatSummaryResponse {
        ChatSummaryResponse {
            chat_id: self.chat.chat_id.clone(),
            title: self.chat.title.clone(),
            created_at: display_timestamp(&self.chat.created_at),
            updated_at: display_timestamp(&self.chat.updated_at),
            is_active: self.chat.is_active,
            last_message: self.last_message.clone(),
        }
    }
}

impl ChatMessage {
    pub fn to_response(&self) -> MessageResponse {
        MessageResponse {
            message_id: self.message_id.clone(),
            content: self.content.clone(),
            is_user_message: self.is_user_message,
            created_at: display_timestamp(&self.created_at),
        }
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Extract the caller's user id.
///
/// Absent, `null`, empty and `0` all count as missing, mirroring how the
/// mobile client sends "no user".
pub fn require_user_id(raw: Option<&Value>) -> Result<i64, ServerError> {
    let invalid = || ServerError::BadRequest("User ID must be an integer".into());
    let id = match raw {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(n.as_i64().ok_or_else(invalid)?),
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().parse::<i64>().map_err(|_| invalid())?),
        Some(_) => return Err(invalid()),
    };
    match id {
        Some(id) if id != 0 => Ok(id),
        _ => Err(ServerError::BadRequest("User ID is required".into())),
    }
}

/// Caller id for operations on an existing chat. Anything that is not a
/// usable id yields `None`, which can own no chat, so those requests end in
/// the operation's "not found" reply rather than a validation error.
pub fn owner_id(raw: Option<&Value>) -> Option<i64> {
    require_user_id(raw).ok()
}

/// Same rules as [`require_user_id`] for a query-string value.
pub fn require_user_id_param(raw: Option<&str>) -> Result<i64, ServerError> {
    require_user_id(raw.map(|s| Value::String(s.to_owned())).as_ref())
}

/// The message text of a send request. Only an absent or empty string is
/// missing; whitespace is passed on as typed.
pub fn require_message(raw: Option<&str>) -> Result<&str, ServerError> {
    raw.filter(|m| !m.is_empty())
        .ok_or_else(|| ServerError::BadRequest("Message is required".into()))
}
