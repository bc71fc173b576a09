//! Liveness check for finchat-server.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

/// `/health` sits outside `/api` so load balancers can poll it without
/// touching the chat routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Reports that the process is serving HTTP, with the crate version.
///
/// It checks neither MySQL nor Groq. A database outage shows up as 500s on
/// `/api/chats`, and a Groq outage only as fallback replies, so this check
/// stays green through both.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "finchat-server is accepting requests", body = Value)
    )
)]
pub async fn get_health() -> Json<Value> {
    Json(json!({
        "status":  "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
