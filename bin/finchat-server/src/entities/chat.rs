use crate::entities::{
    AnyStore, decode_timestamp_column, encode_timestamp,
    dao::{Chat, ChatMessage, ChatSummary},
};
use chrono::NaiveDateTime;
use std::future::Future;

type ChatRow = (String, i64, Option<String>, String, String, i64);
type SummaryRow = (String, i64, Option<String>, String, String, i64, Option<String>);
type MessageRow = (String, String, String, i64, String);

/// Select list for [`ChatRow`].
const CHAT_COLUMNS: &str = "c.chat_id, c.user_id, c.title, \
     CAST(c.created_at AS CHAR), CAST(c.updated_at AS CHAR), CAST(c.is_active AS SIGNED)";

/// Chat and message lifecycle.
///
/// Every method that touches an existing chat takes the caller's `user_id`
/// and filters on it, so a chat owned by someone else behaves exactly like a
/// chat that does not exist.
pub trait ChatStore: Send + Sync + 'static {
    fn user_exists(&self, user_id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Insert a new chat together with its greeting in one transaction.
    fn create_chat(
        &self,
        chat: Chat,
        greeting: ChatMessage,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Look up a chat owned by `user_id`, active or not.
    fn find_chat(
        &self,
        chat_id: &str,
        user_id: i64,
    ) -> impl Future<Output = Result<Option<Chat>, sqlx::Error>> + Send;

    /// Persist one user line and its reply, advancing the chat's
    /// `updated_at` to the reply's timestamp.
    ///
    /// Runs as a single transaction that first re-checks ownership and the
    /// active flag; returns `false` and writes nothing when the chat is gone,
    /// not owned by `user_id`, or already ended.
    fn record_exchange(
        &self,
        user_id: i64,
        user_message: ChatMessage,
        assistant_message: ChatMessage,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Mark an active chat inactive. Returns `false` if no active chat with
    /// that id belongs to `user_id`.
    fn end_chat(
        &self,
        chat_id: &str,
        user_id: i64,
        at: NaiveDateTime,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// All chats of `user_id`, most recently updated first.
    fn list_chats(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Vec<ChatSummary>, sqlx::Error>> + Send;

    /// Messages of a chat, oldest first.
    fn list_messages(
        &self,
        chat_id: &str,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, sqlx::Error>> + Send;
}

impl ChatStore for AnyStore {
    async fn user_exists(&self, user_id: i64) -> Result<bool, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn create_chat(&self, chat: Chat, greeting: ChatMessage) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO chats (chat_id, user_id, title, created_at, updated_at, is_active) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&chat.chat_id)
        .bind(chat.user_id)
        .bind(&chat.title)
        .bind(encode_timestamp(&chat.created_at))
        .bind(encode_timestamp(&chat.updated_at))
        .bind(chat.is_active)
        .execute(&mut *tx)
        .await?;
        insert_message(&mut tx, &greeting).await?;
        tx.commit().await
    }

    async fn find_chat(&self, chat_id: &str, user_id: i64) -> Result<Option<Chat>, sqlx::Error> {
        let row: Option<ChatRow> = sqlx::query_as(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats c WHERE c.chat_id = ? AND c.user_id = ?"
        ))
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(chat_from_row).transpose()
    }

    async fn record_exchange(
        &self,
        user_id: i64,
        user_message: ChatMessage,
        assistant_message: ChatMessage,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let touched = sqlx::query(
            "UPDATE chats SET updated_at = ? \
             WHERE chat_id = ? AND user_id = ? AND is_active = ?",
        )
        .bind(encode_timestamp(&assistant_message.created_at))
        .bind(&assistant_message.chat_id)
        .bind(user_id)
        .bind(true)
        .execute(&mut *tx)
        .await?;
        if touched.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        insert_message(&mut tx, &user_message).await?;
        insert_message(&mut tx, &assistant_message).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn end_chat(
        &self,
        chat_id: &str,
        user_id: i64,
        at: NaiveDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE chats SET is_active = ?, updated_at = ? \
             WHERE chat_id = ? AND user_id = ? AND is_active = ?",
        )
        .bind(false)
        .bind(encode_timestamp(&at))
        .bind(chat_id)
        .bind(user_id)
        .bind(true)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_chats(&self, user_id: i64) -> Result<Vec<ChatSummary>, sqlx::Error> {
        let rows: Vec<SummaryRow> = sqlx::query_as(&format!(
            "SELECT {CHAT_COLUMNS}, \
                    CAST((SELECT m.content FROM chat_messages m \
                          WHERE m.chat_id = c.chat_id \
                          ORDER BY m.created_at DESC, m.is_user_message ASC LIMIT 1) AS CHAR) \
             FROM chats c WHERE c.user_id = ? ORDER BY c.updated_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(
                |(chat_id, user_id, title, created_at, updated_at, is_active, last_message)| {
                    Ok(ChatSummary {
                        chat: chat_from_row((chat_id, user_id, title, created_at, updated_at, is_active))?,
                        last_message,
                    })
                },
            )
            .collect()
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT message_id, chat_id, CAST(content AS CHAR), \
                    CAST(is_user_message AS SIGNED), CAST(created_at AS CHAR) \
             FROM chat_messages WHERE chat_id = ? \
             ORDER BY created_at ASC, is_user_message DESC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(message_id, chat_id, content, is_user_message, created_at)| {
                Ok(ChatMessage {
                    message_id,
                    chat_id,
                    content,
                    is_user_message: is_user_message != 0,
                    created_at: decode_timestamp_column(&created_at, "chat_messages.created_at")?,
                })
            })
            .collect()
    }
}

async fn insert_message(
    tx: &mut sqlx::Transaction<'_, sqlx::Any>,
    msg: &ChatMessage,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO chat_messages (message_id, chat_id, content, is_user_message, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&msg.message_id)
    .bind(&msg.chat_id)
    .bind(&msg.content)
    .bind(msg.is_user_message)
    .bind(encode_timestamp(&msg.created_at))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn chat_from_row(
    (chat_id, user_id, title, created_at, updated_at, is_active): ChatRow,
) -> Result<Chat, sqlx::Error> {
    Ok(Chat {
        chat_id,
        user_id,
        title,
        created_at: decode_timestamp_column(&created_at, "chats.created_at")?,
        updated_at: decode_timestamp_column(&updated_at, "chats.updated_at")?,
        is_active: is_active != 0,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{decode_timestamp, now_timestamp};
    use crate::testing;
    use chrono::Duration;

    fn ts(raw: &str) -> NaiveDateTime {
        decode_timestamp(raw).unwrap()
    }

    fn message(chat_id: &str, content: &str, is_user: bool, at: NaiveDateTime) -> ChatMessage {
        ChatMessage {
            message_id: uuid::Uuid::new_v4().to_string(),
            chat_id: chat_id.to_owned(),
            content: content.to_owned(),
            is_user_message: is_user,
            created_at: at,
        }
    }

    async fn open_chat(store: &AnyStore, chat_id: &str, user_id: i64, at: NaiveDateTime) {
        let chat = Chat {
            chat_id: chat_id.to_owned(),
            user_id,
            title: Some("New Financial Chat".into()),
            created_at: at,
            updated_at: at,
            is_active: true,
        };
        store
            .create_chat(chat, message(chat_id, "hello", false, at))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn user_exists_reflects_users_table() {
        let store = testing::store().await;
        testing::seed_user(&store, 7).await;
        assert!(store.user_exists(7).await.unwrap());
        assert!(!store.user_exists(8).await.unwrap());
    }

    #[tokio::test]
    async fn create_chat_writes_chat_and_greeting_with_same_timestamp() {
        let store = testing::store().await;
        testing::seed_user(&store, 7).await;
        let at = ts("2025-01-01 10:00:00.000001");
        open_chat(&store, "c1", 7, at).await;

        let chat = store.find_chat("c1", 7).await.unwrap().expect("chat");
        assert!(chat.is_active);
        assert_eq!(chat.created_at, at);
        assert_eq!(chat.updated_at, at);

        let messages = store.list_messages("c1").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].is_user_message);
        assert_eq!(messages[0].created_at, at);
    }

    #[tokio::test]
    async fn create_chat_rolls_back_when_greeting_insert_fails() {
        let store = testing::store().await;
        testing::seed_user(&store, 7).await;
        let at = now_timestamp();
        open_chat(&store, "c1", 7, at).await;

        // Reusing the greeting id violates the primary key on the second insert.
        let existing = store.list_messages("c1").await.unwrap().remove(0);
        let chat = Chat {
            chat_id: "c2".into(),
            user_id: 7,
            title: None,
            created_at: at,
            updated_at: at,
            is_active: true,
        };
        let greeting = ChatMessage { chat_id: "c2".into(), ..existing };
        assert!(store.create_chat(chat, greeting).await.is_err());
        assert!(store.find_chat("c2", 7).await.unwrap().is_none());
        assert_eq!(testing::count_chats(&store).await, 1);
    }

    #[tokio::test]
    async fn find_chat_enforces_ownership() {
        let store = testing::store().await;
        testing::seed_user(&store, 7).await;
        testing::seed_user(&store, 9).await;
        open_chat(&store, "c1", 7, now_timestamp()).await;
        assert!(store.find_chat("c1", 9).await.unwrap().is_none());
        assert!(store.find_chat("missing", 7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_exchange_inserts_pair_and_advances_updated_at() {
        let store = testing::store().await;
        testing::seed_user(&store, 7).await;
        let start = ts("2025-01-01 10:00:00");
        open_chat(&store, "c1", 7, start).await;

        let asked = start + Duration::seconds(5);
        let answered = asked + Duration::milliseconds(300);
        let ok = store
            .record_exchange(
                7,
                message("c1", "What did I spend on food?", true, asked),
                message("c1", "About 120.", false, answered),
            )
            .await
            .unwrap();
        assert!(ok);

        let chat = store.find_chat("c1", 7).await.unwrap().unwrap();
        assert_eq!(chat.updated_at, answered);
        let contents: Vec<_> = store
            .list_messages("c1")
            .await
            .unwrap()
            .into_iter()
            .map(|m| (m.content, m.is_user_message))
            .collect();
        assert_eq!(
            contents,
            vec![
                ("hello".to_owned(), false),
                ("What did I spend on food?".to_owned(), true),
                ("About 120.".to_owned(), false),
            ]
        );
    }

    #[tokio::test]
    async fn record_exchange_rejects_inactive_and_foreign_chats() {
        let store = testing::store().await;
        testing::seed_user(&store, 7).await;
        testing::seed_user(&store, 9).await;
        let at = now_timestamp();
        open_chat(&store, "c1", 7, at).await;

        let foreign = store
            .record_exchange(9, message("c1", "hi", true, at), message("c1", "yo", false, at))
            .await
            .unwrap();
        assert!(!foreign);

        assert!(store.end_chat("c1", 7, at).await.unwrap());
        let ended = store
            .record_exchange(7, message("c1", "hi", true, at), message("c1", "yo", false, at))
            .await
            .unwrap();
        assert!(!ended);
        assert_eq!(testing::count_messages(&store, "c1").await, 1);
    }

    #[tokio::test]
    async fn end_chat_flips_once() {
        let store = testing::store().await;
        testing::seed_user(&store, 7).await;
        let at = now_timestamp();
        open_chat(&store, "c1", 7, at).await;

        assert!(!store.end_chat("c1", 8, at).await.unwrap());
        assert!(store.end_chat("c1", 7, at).await.unwrap());
        assert!(!store.end_chat("c1", 7, at).await.unwrap());

        let chat = store.find_chat("c1", 7).await.unwrap().unwrap();
        assert!(!chat.is_active);
    }

    #[tokio::test]
    async fn list_chats_orders_by_updated_and_attaches_last_message() {
        let store = testing::store().await;
        testing::seed_user(&store, 7).await;
        testing::seed_user(&store, 9).await;
        let base = ts("2025-01-01 10:00:00");
        open_chat(&store, "older", 7, base).await;
        open_chat(&store, "newer", 7, base + Duration::minutes(1)).await;
        open_chat(&store, "foreign", 9, base + Duration::minutes(2)).await;

        store
            .record_exchange(
                7,
                message("older", "q", true, base + Duration::minutes(3)),
                message("older", "latest answer", false, base + Duration::minutes(4)),
            )
            .await
            .unwrap();

        let chats = store.list_chats(7).await.unwrap();
        let ids: Vec<_> = chats.iter().map(|c| c.chat.chat_id.as_str()).collect();
        assert_eq!(ids, vec!["older", "newer"]);
        assert_eq!(chats[0].last_message.as_deref(), Some("latest answer"));
        assert_eq!(chats[1].last_message.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn list_chats_reports_missing_last_message_as_none() {
        let store = testing::store().await;
        testing::seed_user(&store, 7).await;
        sqlx::query(
            "INSERT INTO chats (chat_id, user_id, title, created_at, updated_at, is_active) \
             VALUES ('bare', 7, NULL, '2025-01-01 00:00:00.000000', '2025-01-01 00:00:00.000000', 1)",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let chats = store.list_chats(7).await.unwrap();
        assert_eq!(chats.len(), 1);
        assert!(chats[0].last_message.is_none());
        assert!(chats[0].chat.title.is_none());
    }

    #[tokio::test]
    async fn unreadable_timestamp_fails_the_read() {
        let store = testing::store().await;
        testing::seed_user(&store, 7).await;
        sqlx::query(
            "INSERT INTO chats (chat_id, user_id, title, created_at, updated_at, is_active) \
             VALUES ('broken', 7, NULL, 'soon', '2025-01-01 00:00:00.000000', 1)",
        )
        .execute(store.pool())
        .await
        .unwrap();

        assert!(matches!(
            store.find_chat("broken", 7).await,
            Err(sqlx::Error::ColumnDecode { .. })
        ));
        assert!(store.list_chats(7).await.is_err());
    }
}
