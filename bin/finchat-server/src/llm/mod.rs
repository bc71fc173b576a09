//! Completion client.
//!
//! [`CompletionProvider`] is the seam between the chat handlers and the
//! external model. [`groq::GroqClient`] is the production implementation;
//! tests plug in canned providers.
//!
//! Upstream failures never reach the HTTP caller: [`reply_or_fallback`]
//! logs them and substitutes [`FALLBACK_REPLY`].

pub mod groq;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::entities::{ChatMessage, FinancialContext};

/// Reply stored and returned when the completion service cannot answer.
pub const FALLBACK_REPLY: &str =
    "I'm sorry, I'm having trouble processing your request right now. Please try again later.";

/// One entry of the message list sent to the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// `"system"`, `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion response had no usable choice")]
    EmptyReply,

    #[error("failed to encode financial context: {0}")]
    Context(#[from] serde_json::Error),
}

/// Anything that can turn a message list into one assistant reply.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, CompletionError>;
}

/// System prompt embedding the user's financial snapshot.
pub fn system_prompt(context: &FinancialContext) -> Result<String, CompletionError> {
    let data = serde_json::to_string(context)?;
    Ok(format!(
        "You are a helpful financial assistant for a personal finance tracking application.\n\
         You have access to the user's financial data and can answer questions about their \
         spending, budget, and carbon footprint.\n\
         Current user data: {data}\n\n\
         Be helpful, concise, and focus on providing actionable financial insights."
    ))
}

/// System entry followed by the chat history, oldest first.
pub fn build_messages(
    context: &FinancialContext,
    history: &[ChatMessage],
) -> Result<Vec<PromptMessage>, CompletionError> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(PromptMessage::system(system_prompt(context)?));
    messages.extend(history.iter().map(|m| {
        if m.is_user_message {
            PromptMessage::user(m.content.clone())
        } else {
            PromptMessage::assistant(m.content.clone())
        }
    }));
    Ok(messages)
}

/// Ask `provider` for a reply; on any failure log it and return
/// [`FALLBACK_REPLY`] instead.
pub async fn reply_or_fallback(
    provider: &dyn CompletionProvider,
    context: &FinancialContext,
    history: &[ChatMessage],
) -> String {
    let result = match build_messages(context, history) {
        Ok(messages) => provider.complete(&messages).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(reply) => {
            debug!(reply_len = reply.len(), "completion received");
            reply
        }
        Err(e) => {
            warn!(error = %e, "completion failed; using fallback reply");
            FALLBACK_REPLY.to_owned()
        }
    }
}
