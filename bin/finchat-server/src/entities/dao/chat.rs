use chrono::NaiveDateTime;

/// A row in the `chats` table.
#[derive(Debug, Clone)]
pub struct Chat {
    pub chat_id: String,
    pub user_id: i64,
    pub title: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub is_active: bool,
}

/// A `chats` row annotated with the content of its newest message.
#[derive(Debug, Clone)]
pub struct ChatSummary {
    pub chat: Chat,
    /// `None` when the chat has no messages at all.
    pub last_message: Option<String>,
}
