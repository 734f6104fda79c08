//! OpenAI-compatible chat-completions client.
//!
//! One request, one response; streaming is out of scope for the chain.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ragdb_core::traits::CompletionBackend;
use ragdb_core::types::CompletionRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

pub struct ChatCompletionClient {
    http: reqwest::Client,
    config: GenerationConfig,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl ChatCompletionClient {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build http client")?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system_instruction.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Context:\n{}\n\nQuestion: {}",
                        request.context, request.question
                    ),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        let mut http_request = self.http.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            http_request = http_request.bearer_auth(key);
        }

        tracing::debug!(model = %self.config.model, "completion request");
        let response = http_request
            .send()
            .await
            .context("completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("completion endpoint returned {status}: {detail}"));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("malformed completion response")?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("completion response contained no choices"))?;
        Ok(choice.message.content)
    }
}
