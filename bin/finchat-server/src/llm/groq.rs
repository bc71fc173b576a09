//! Groq chat-completions client (OpenAI-compatible wire format).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionError, CompletionProvider, PromptMessage};
use crate::config::Config;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Does not derive `Debug` so the API key cannot end up in logs.
pub struct GroqClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GroqClient {
    /// No request timeout is set; a slow completion holds the request open
    /// for as long as reqwest and the upstream allow.
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, CompletionError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_owned(),
            model: model.to_owned(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, CompletionError> {
        Self::new(&cfg.groq_base_url, &cfg.groq_api_key, &cfg.groq_model)
    }
}

#[async_trait]
impl CompletionProvider for GroqClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, CompletionError> {
        debug!(model = %self.model, message_count = messages.len(), "sending completion request");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ChatCompletionRequest { model: &self.model, messages })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status: status.as_u16(), body });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(CompletionError::EmptyReply)
    }
}
