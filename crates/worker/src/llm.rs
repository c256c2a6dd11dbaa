//! Chat-completion client for the script stage.
//!
//! Speaks either the OpenAI chat-completions API or the Anthropic messages
//! API, selected by [`LlmProvider`], using [`reqwest`].

use serde::{Deserialize, Serialize};

use crate::config::LlmProvider;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Errors from the LLM API layer.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("LLM API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("LLM returned no text")]
    EmptyResponse,
}

/// A single-turn completion request.
#[derive(Debug, Clone)]
pub struct Completion<'a> {
    pub system: Option<&'a str>,
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl OpenAiResponse {
    fn into_text(self) -> Option<String> {
        self.choices.into_iter().next()?.message.content
    }
}

impl AnthropicResponse {
    fn into_text(self) -> Option<String> {
        let text: String = self
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        Some(text)
    }
}

/// HTTP client for the configured provider.
pub struct LlmClient {
    client: reqwest::Client,
    provider: LlmProvider,
}

impl LlmClient {
    pub fn new(provider: LlmProvider) -> Self {
        Self::with_client(reqwest::Client::new(), provider)
    }

    pub fn with_client(client: reqwest::Client, provider: LlmProvider) -> Self {
        Self { client, provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Send one prompt and return the trimmed reply text.
    pub async fn complete(&self, request: &Completion<'_>) -> Result<String, LlmError> {
        let text = match &self.provider {
            LlmProvider::OpenAi { api_key, model } => {
                let mut messages = Vec::with_capacity(2);
                if let Some(system) = request.system {
                    messages.push(ChatMessage {
                        role: "system",
                        content: system,
                    });
                }
                messages.push(ChatMessage {
                    role: "user",
                    content: request.prompt,
                });
                let body = serde_json::json!({
                    "model": model,
                    "messages": messages,
                    "temperature": request.temperature,
                    "max_tokens": request.max_tokens,
                });

                let response = self
                    .client
                    .post(OPENAI_URL)
                    .bearer_auth(api_key)
                    .json(&body)
                    .send()
                    .await?;
                Self::parse_response::<OpenAiResponse>(response)
                    .await?
                    .into_text()
            }
            LlmProvider::Anthropic { api_key, model } => {
                let messages = [ChatMessage {
                    role: "user",
                    content: request.prompt,
                }];
                let mut body = serde_json::json!({
                    "model": model,
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                    "messages": messages,
                });
                if let Some(system) = request.system {
                    body["system"] = serde_json::Value::String(system.to_string());
                }

                let response = self
                    .client
                    .post(ANTHROPIC_URL)
                    .header("x-api-key", api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&body)
                    .send()
                    .await?;
                Self::parse_response::<AnthropicResponse>(response)
                    .await?
                    .into_text()
            }
        };

        text.map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    // ---- private helpers ----

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, LlmError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }
}
