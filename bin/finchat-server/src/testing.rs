//! Shared fixtures for unit tests: an in-memory SQLite store with the
//! external `users` / `categories` / `transactions` tables, canned completion
//! providers, and a router wired to both.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::any::AnyPoolOptions;
use tower::ServiceExt;

use crate::config::Config;
use crate::entities::AnyStore;
use crate::llm::{CompletionError, CompletionProvider, PromptMessage};
use crate::state::AppState;

const EXTERNAL_TABLES: [&str; 3] = [
    "CREATE TABLE users (id INTEGER PRIMARY KEY)",
    "CREATE TABLE categories (id INTEGER PRIMARY KEY, name VARCHAR(255) NOT NULL)",
    "CREATE TABLE transactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id BIGINT NOT NULL,
        category_id BIGINT,
        amount DECIMAL(10, 2),
        merchant_name VARCHAR(255),
        created_at DATETIME,
        carbon_emission DECIMAL(10, 2)
    )",
];

pub fn config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".into(),
        database_url: "sqlite::memory:".into(),
        db_max_connections: 1,
        groq_api_key: String::new(),
        groq_base_url: "http://127.0.0.1:9/openai/v1".into(),
        groq_model: "llama3-70b-8192".into(),
        log_level: "info".into(),
        log_json: false,
        cors_allowed_origins: None,
        enable_swagger: false,
    }
}

/// A migrated in-memory database. One pooled connection that never expires,
/// since every SQLite `:memory:` connection is its own database.
pub async fn store() -> AnyStore {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    for ddl in EXTERNAL_TABLES {
        sqlx::query(ddl).execute(&pool).await.expect("create external table");
    }
    let store = AnyStore::from_pool(pool);
    store.migrate().await.expect("migrate");
    store
}

pub async fn seed_user(store: &AnyStore, id: i64) {
    sqlx::query("INSERT INTO users (id) VALUES (?)")
        .bind(id)
        .execute(store.pool())
        .await
        .expect("seed user");
}

pub async fn seed_category(store: &AnyStore, id: i64, name: &str) {
    sqlx::query("INSERT INTO categories (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(store.pool())
        .await
        .expect("seed category");
}

pub async fn seed_transaction(
    store: &AnyStore,
    user_id: i64,
    category_id: i64,
    amount: &str,
    merchant: &str,
    created_at: &str,
) {
    sqlx::query(
        "INSERT INTO transactions (user_id, category_id, amount, merchant_name, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(category_id)
    .bind(amount)
    .bind(merchant)
    .bind(created_at)
    .execute(store.pool())
    .await
    .expect("seed transaction");
}

pub async fn count_chats(store: &AnyStore) -> i64 {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats")
        .fetch_one(store.pool())
        .await
        .expect("count chats");
    n
}

pub async fn count_messages(store: &AnyStore, chat_id: &str) -> i64 {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chat_messages WHERE chat_id = ?")
        .bind(chat_id)
        .fetch_one(store.pool())
        .await
        .expect("count messages");
    n
}

/// Replies with a fixed string and remembers every prompt it was sent.
pub struct RecordingCompletion {
    reply: String,
    seen: Mutex<Vec<Vec<PromptMessage>>>,
}

impl RecordingCompletion {
    pub fn replying(reply: &str) -> Self {
        Self { reply: reply.to_owned(), seen: Mutex::new(Vec::new()) }
    }

    pub fn seen(&self) -> Vec<Vec<PromptMessage>> {
        self.seen.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl CompletionProvider for RecordingCompletion {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, CompletionError> {
        self.seen.lock().expect("poisoned").push(messages.to_vec());
        Ok(self.reply.clone())
    }
}

/// Always fails the way an unreachable service would.
pub struct FailingCompletion;

#[async_trait]
impl CompletionProvider for FailingCompletion {
    async fn complete(&self, _messages: &[PromptMessage]) -> Result<String, CompletionError> {
        Err(CompletionError::Status { status: 503, body: "upstream unavailable".into() })
    }
}

pub fn app(store: AnyStore, completion: Arc<dyn CompletionProvider>) -> Router {
    crate::routes::build(Arc::new(AppState {
        config: Arc::new(config()),
        store: Arc::new(store),
        completion,
    }))
}

/// Send one request through `app` and decode the JSON body.
pub async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, json)
}
