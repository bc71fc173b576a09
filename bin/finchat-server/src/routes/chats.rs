//! Chat lifecycle endpoints under `/api/chats`.
//!
//! A chat moves `active → inactive` exactly once. Reads work in both states;
//! writes (new messages, ending) require an active chat owned by the caller.
//! Ownership failures are reported as 404 so callers cannot discover other
//! users' chat ids.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::entities::{Chat, ChatMessage, ChatStore, FinanceStore, now_timestamp};
use crate::error::ServerError;
use crate::llm;
use crate::schemas::chat::{
    ChatHistoryResponse, ChatListResponse, ChatSummaryResponse, EndChatRequest, EndChatResponse,
    MessageResponse, SendMessageRequest, SendMessageResponse, StartChatRequest,
    StartChatResponse, UserQuery, owner_id, require_message, require_user_id,
    require_user_id_param,
};
use crate::state::AppState;

pub const DEFAULT_CHAT_TITLE: &str = "New Financial Chat";

pub const GREETING: &str =
    "Hello! I'm your financial assistant. How can I help you with your finances today?";

#[derive(OpenApi)]
#[openapi(
    paths(start_chat, send_message, end_chat, list_chats, get_chat),
    components(schemas(
        StartChatRequest,
        StartChatResponse,
        SendMessageRequest,
        SendMessageResponse,
        EndChatRequest,
        EndChatResponse,
        ChatListResponse,
        ChatSummaryResponse,
        ChatHistoryResponse,
        MessageResponse
    ))
)]
pub struct ChatsApi;

/// Register chat routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chats", get(list_chats))
        .route("/chats/start", post(start_chat))
        .route("/chats/{chat_id}", get(get_chat))
        .route("/chats/{chat_id}/message", post(send_message))
        .route("/chats/{chat_id}/end", post(end_chat))
}

#[utoipa::path(
    post,
    path = "/api/chats/start",
    tag = "chats",
    request_body = StartChatRequest,
    responses(
        (status = 200, description = "Chat created", body = StartChatResponse),
        (status = 400, description = "Missing user_id"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Database error"),
    )
)]
pub async fn start_chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StartChatRequest>, JsonRejection>,
) -> Result<Json<StartChatResponse>, ServerError> {
    let Json(req) = payload?;
    let user_id = require_user_id(req.user_id.as_ref())?;

    if !state.store.user_exists(user_id).await? {
        return Err(ServerError::NotFound("User not found".into()));
    }

    let now = now_timestamp();
    let chat = Chat {
        chat_id: Uuid::new_v4().to_string(),
        user_id,
        title: Some(DEFAULT_CHAT_TITLE.to_owned()),
        created_at: now,
        updated_at: now,
        is_active: true,
    };
    let greeting = ChatMessage {
        message_id: Uuid::new_v4().to_string(),
        chat_id: chat.chat_id.clone(),
        content: GREETING.to_owned(),
        is_user_message: false,
        created_at: now,
    };
    let chat_id = chat.chat_id.clone();
    state.store.create_chat(chat, greeting).await?;

    info!(%chat_id, user_id, "chat started");
    Ok(Json(StartChatResponse { chat_id, message: GREETING.to_owned() }))
}

#[utoipa::path(
    post,
    path = "/api/chats/{chat_id}/message",
    tag = "chats",
    params(("chat_id" = String, Path, description = "Chat to append to")),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Assistant reply stored", body = SendMessageResponse),
        (status = 400, description = "Missing message"),
        (status = 404, description = "Chat not found, not owned by user_id, or inactive"),
        (status = 500, description = "Database error"),
    )
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<SendMessageResponse>, ServerError> {
    let Json(req) = payload?;
    let text = require_message(req.message.as_deref())?.to_owned();

    let chat_not_found = || ServerError::NotFound("Chat not found or inactive".into());
    let Some(user_id) = owner_id(req.user_id.as_ref()) else {
        return Err(chat_not_found());
    };
    match state.store.find_chat(&chat_id, user_id).await? {
        Some(chat) if chat.is_active => {}
        _ => return Err(chat_not_found()),
    }

    let user_message = ChatMessage {
        message_id: Uuid::new_v4().to_string(),
        chat_id: chat_id.clone(),
        content: text,
        is_user_message: true,
        created_at: now_timestamp(),
    };
    info!(%chat_id, user_id, message_len = user_message.content.len(), "user message received");

    let mut history = state.store.list_messages(&chat_id).await?;
    history.push(user_message.clone());
    let context = state.store.build_context(user_id).await?;

    let reply = llm::reply_or_fallback(state.completion.as_ref(), &context, &history).await;

    let assistant_message = ChatMessage {
        message_id: Uuid::new_v4().to_string(),
        chat_id: chat_id.clone(),
        content: reply,
        is_user_message: false,
        created_at: now_timestamp(),
    };
    let message_id = assistant_message.message_id.clone();
    let content = assistant_message.content.clone();

    if !state
        .store
        .record_exchange(user_id, user_message, assistant_message)
        .await?
    {
        warn!(%chat_id, user_id, "chat ended while the reply was being generated");
        return Err(chat_not_found());
    }

    Ok(Json(SendMessageResponse { message_id, content }))
}

#[utoipa::path(
    post,
    path = "/api/chats/{chat_id}/end",
    tag = "chats",
    params(("chat_id" = String, Path, description = "Chat to end")),
    request_body = EndChatRequest,
    responses(
        (status = 200, description = "Chat ended", body = EndChatResponse),
        (status = 404, description = "Chat not found, not owned by user_id, or already inactive"),
        (status = 500, description = "Database error"),
    )
)]
pub async fn end_chat(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
    payload: Result<Json<EndChatRequest>, JsonRejection>,
) -> Result<Json<EndChatResponse>, ServerError> {
    let Json(req) = payload?;

    let chat_not_found = || ServerError::NotFound("Chat not found or already inactive".into());
    let Some(user_id) = owner_id(req.user_id.as_ref()) else {
        return Err(chat_not_found());
    };
    if !state.store.end_chat(&chat_id, user_id, now_timestamp()).await? {
        return Err(chat_not_found());
    }

    info!(%chat_id, user_id, "chat ended");
    Ok(Json(EndChatResponse {
        success: true,
        message: "Chat ended successfully".into(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/chats",
    tag = "chats",
    params(UserQuery),
    responses(
        (status = 200, description = "Chats of the user, most recently updated first", body = ChatListResponse),
        (status = 400, description = "Missing user_id"),
        (status = 500, description = "Database error"),
    )
)]
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<ChatListResponse>, ServerError> {
    let Query(q) = query?;
    let user_id = require_user_id_param(q.user_id.as_deref())?;
    let chats = state.store.list_chats(user_id).await?;
    Ok(Json(ChatListResponse {
        chats: chats.iter().map(|c| c.to_response()).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/chats/{chat_id}",
    tag = "chats",
    params(
        ("chat_id" = String, Path, description = "Chat to read"),
        UserQuery
    ),
    responses(
        (status = 200, description = "Chat with its messages, oldest first", body = ChatHistoryResponse),
        (status = 400, description = "Missing user_id"),
        (status = 404, description = "Chat not found"),
        (status = 500, description = "Database error"),
    )
)]
pub async fn get_chat(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<ChatHistoryResponse>, ServerError> {
    let Query(q) = query?;
    let user_id = require_user_id_param(q.user_id.as_deref())?;

    let chat = state
        .store
        .find_chat(&chat_id, user_id)
        .await?
        .ok_or_else(|| ServerError::NotFound("Chat not found".into()))?;
    let messages = state.store.list_messages(&chat_id).await?;

    Ok(Json(ChatHistoryResponse {
        chat_id: chat.chat_id,
        title: chat.title,
        is_active: chat.is_active,
        messages: messages.iter().map(|m| m.to_response()).collect(),
    }))
}
