//! OpenAI-compatible chat-completions client.
//!
//! Both supported providers (DeepSeek, Qwen) expose the same wire shape.
//! Tool-calling is deliberately never requested: the decision prompts
//! carry all data, and tool loops have historically burned unbounded
//! tokens.

use crate::domain::errors::DecisionError;
use crate::domain::ports::{ChatModel, ChatOutcome, ChatRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    DeepSeek,
    Qwen,
}

impl ModelProvider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deepseek" => Some(ModelProvider::DeepSeek),
            "qwen" => Some(ModelProvider::Qwen),
            _ => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ModelProvider::DeepSeek => "https://api.deepseek.com/v1",
            ModelProvider::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiCompatClient {
    pub fn new(
        provider: ModelProvider,
        base_url_override: Option<String>,
        api_key: String,
        model: String,
        timeout_secs: u64,
    ) -> Self {
        let base_url = base_url_override.unwrap_or_else(|| provider.default_base_url().to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            api_key,
            model,
            timeout_secs,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatOutcome, DecisionError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            response_format: request.force_json.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let url = format!("{}/chat/completions", self.base_url);
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DecisionError::ModelTimeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    DecisionError::Provider {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(DecisionError::Provider {
                reason: format!("{status}: {body_text}"),
            });
        }

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|e| DecisionError::Provider {
                reason: format!("response decode failed: {e}"),
            })?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| DecisionError::Provider {
                reason: "empty choices in completion response".to_string(),
            })?;

        Ok(ChatOutcome {
            content,
            tokens_used: parsed.usage.map(|u| u.total_tokens),
            latency_ms: started.elapsed().as_millis() as u64,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
