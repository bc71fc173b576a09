use chrono::NaiveDateTime;

/// A single message row in the `chat_messages` table.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub message_id: String,
    pub chat_id: String,
    pub content: String,
    /// `true` for the caller's lines, `false` for assistant replies
    /// (including the greeting written when the chat starts).
    pub is_user_message: bool,
    pub created_at: NaiveDateTime,
}
