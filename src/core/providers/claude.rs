//! Restructured-system adapter: Claude-shaped upstream. Only the first
//! system message survives; embeddings are unsupported here by contract,
//! not by omission.

use super::pricing::estimate_cost;
use super::{ChatStream, ChatStreamEvent, Provider, ProviderCapabilities, ProviderContext};
use crate::config::ProviderConfig;
use crate::core::types::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse,
    FinishReason, GatewayMetadata, Role, Usage,
};
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;
use futures::stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_MAX_TOKENS: u32 = 4096;
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct ClaudeMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ClaudeChatPayload<'a> {
    model: &'a str,
    messages: Vec<ClaudeMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    id: String,
    content: Vec<ClaudeContentBlock>,
    #[serde(rename = "stop_reason")]
    stop_reason: Option<String>,
    usage: ClaudeUsage,
}

#[derive(Debug, Deserialize)]
struct ClaudeContentBlock {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

fn map_stop_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        Some("end_turn") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        Some("stop_sequence") => FinishReason::Stop,
        _ => FinishReason::Stop,
    }
}

/// Extracts the first system message (dropping any further ones) and
/// returns the remaining messages with system-role entries removed.
fn split_system(messages: &[ChatMessage]) -> (Option<&str>, Vec<ClaudeMessage<'_>>) {
    let system = messages
        .iter()
        .find(|m| m.role == Role::System)
        .map(|m| m.content.as_str());

    let rest = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| ClaudeMessage {
            role: match m.role {
                Role::Assistant => "assistant",
                _ => "user",
            },
            content: &m.content,
        })
        .collect();

    (system, rest)
}

pub struct ClaudeAdapter {
    config: ProviderConfig,
    client: Client,
}

impl ClaudeAdapter {
    pub fn new(config: ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { config, client }
    }

    fn base_url(&self) -> String {
        self.config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.anthropic.com/v1".to_string())
    }

    fn has_credential(&self) -> bool {
        self.config
            .api_key
            .as_ref()
            .map(|k| !k.is_empty())
            .unwrap_or(false)
    }

    fn classify_status(&self, status: reqwest::StatusCode, message: String) -> GatewayError {
        if status.as_u16() == 429 {
            GatewayError::UpstreamThrottled {
                provider: "claude".to_string(),
                message,
            }
        } else if status.is_server_error() {
            GatewayError::UpstreamServerError {
                provider: "claude".to_string(),
                message,
            }
        } else {
            GatewayError::UpstreamClientError {
                provider: "claude".to_string(),
                message,
            }
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::UpstreamTimeout {
                provider: "claude".to_string(),
                message: e.to_string(),
            }
        } else {
            GatewayError::UpstreamTransport {
                provider: "claude".to_string(),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl Provider for ClaudeAdapter {
    fn name(&self) -> &str {
        "claude"
    }

    fn priority(&self) -> Option<i32> {
        self.config.priority
    }

    fn available(&self) -> bool {
        self.config.enabled && self.has_credential()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_chat: true,
            supports_chat_stream: true,
            supports_embedding: false,
        }
    }

    fn supports_model(&self, model: Option<&str>) -> bool {
        let Some(model) = model else { return true };
        if self.config.models.is_empty() {
            return true;
        }
        let lower = model.to_ascii_lowercase();
        self.config
            .models
            .iter()
            .any(|pattern| lower.contains(&pattern.to_ascii_lowercase()))
    }

    fn advertised_models(&self) -> Vec<String> {
        if !self.config.models.is_empty() {
            self.config.models.clone()
        } else {
            self.config.default_model.clone().into_iter().collect()
        }
    }

    async fn chat(&self, request: &ChatRequest, ctx: &ProviderContext) -> Result<ChatResponse> {
        let started = Instant::now();
        let model = request
            .model
            .clone()
            .or_else(|| self.config.default_model.clone())
            .unwrap_or_else(|| "claude-3-5-sonnet-20241022".to_string());

        let (system, messages) = split_system(&request.messages);
        let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);

        let payload = ClaudeChatPayload {
            model: &model,
            messages,
            system,
            max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stop_sequences: &request.stop,
        };

        let url = format!("{}/messages", self.base_url());
        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.config.api_key.clone().unwrap_or_default())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_status(status, body));
        }

        let parsed: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let usage = Usage::new(parsed.usage.input_tokens, parsed.usage.output_tokens);
        let text = parsed
            .content
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        let choices = vec![ChatChoice {
            index: 0,
            message: ChatMessage::new(Role::Assistant, text),
            finish_reason: map_stop_reason(parsed.stop_reason.as_deref()),
        }];

        Ok(ChatResponse {
            id: parsed.id,
            created: chrono::Utc::now().timestamp(),
            model,
            choices,
            usage,
            gateway: GatewayMetadata {
                served_by: "claude".to_string(),
                requested_model: request.model.clone(),
                latency_ms: started.elapsed().as_millis() as u64,
                cached: false,
                retry_count: 0,
                request_id: ctx.request_id.clone(),
                estimated_cost: estimate_cost(self.config.pricing.as_ref(), &usage),
            },
        })
    }

    async fn chat_stream(&self, request: &ChatRequest, ctx: &ProviderContext) -> Result<ChatStream> {
        let response = self.chat(request, ctx).await?;
        let model = response.model.clone();
        let events: Vec<Result<ChatStreamEvent>> = response
            .choices
            .into_iter()
            .flat_map(|choice| {
                vec![
                    Ok(ChatStreamEvent::content_delta(
                        &response.id,
                        response.created,
                        &model,
                        choice.index,
                        &choice.message.content,
                    )),
                    Ok(ChatStreamEvent::finish(
                        &response.id,
                        response.created,
                        &model,
                        choice.index,
                        choice.finish_reason,
                    )),
                ]
            })
            .collect();

        Ok(Box::pin(stream::iter(events)))
    }

    async fn embed(
        &self,
        _request: &EmbeddingRequest,
        _ctx: &ProviderContext,
    ) -> Result<EmbeddingResponse> {
        Err(GatewayError::CapabilityUnsupported(
            "claude adapter does not support embeddings".to_string(),
        ))
    }

    async fn health_check(&self) -> bool {
        // No cheap probe endpoint; a configured, credentialed adapter is
        // reported healthy until an actual call proves otherwise.
        true
    }
}
