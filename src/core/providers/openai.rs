//! Passthrough adapter: OpenAI-shaped upstream, and the in-cluster local
//! worker which speaks the identical shape minus the credential.

use super::pricing::estimate_cost;
use super::{ChatStream, ChatStreamEvent, Provider, ProviderCapabilities, ProviderContext};
use crate::config::ProviderConfig;
use crate::core::types::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse,
    EmbeddingVector, FinishReason, GatewayMetadata, Role, Usage,
};
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;
use async_stream::try_stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Serialize)]
struct OpenAiChatPayload<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    id: String,
    created: i64,
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: OpenAiUsage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    index: u32,
    message: OpenAiMessage,
    finish_reason: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingItem>,
    model: String,
    usage: OpenAiUsage,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingItem {
    index: u32,
    embedding: Vec<f32>,
}

fn map_finish_reason(raw: &str) -> FinishReason {
    match raw {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        "tool_calls" => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

pub struct OpenAiAdapter {
    name: String,
    config: ProviderConfig,
    requires_credential: bool,
    client: Client,
}

impl OpenAiAdapter {
    pub fn new(name: String, config: ProviderConfig, requires_credential: bool) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            name,
            config,
            requires_credential,
            client,
        }
    }

    fn base_url(&self) -> String {
        self.config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
    }

    fn has_credential(&self) -> bool {
        self.config
            .api_key
            .as_ref()
            .map(|k| !k.is_empty())
            .unwrap_or(false)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.requires_credential {
            if let Some(key) = &self.config.api_key {
                return builder.bearer_auth(key);
            }
        }
        builder
    }

    fn classify_status(&self, status: reqwest::StatusCode, message: String) -> GatewayError {
        if status.as_u16() == 429 {
            GatewayError::UpstreamThrottled {
                provider: self.name.clone(),
                message,
            }
        } else if status.is_server_error() {
            GatewayError::UpstreamServerError {
                provider: self.name.clone(),
                message,
            }
        } else {
            GatewayError::UpstreamClientError {
                provider: self.name.clone(),
                message,
            }
        }
    }

    /// The in-cluster worker requires no credential and bills nothing;
    /// every other adapter sharing this struct prices from its configured
    /// table.
    fn estimate_cost(&self, usage: &Usage) -> Option<f64> {
        if self.requires_credential {
            estimate_cost(self.config.pricing.as_ref(), usage)
        } else {
            Some(0.0)
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::UpstreamTimeout {
                provider: self.name.clone(),
                message: e.to_string(),
            }
        } else {
            GatewayError::UpstreamTransport {
                provider: self.name.clone(),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> Option<i32> {
        self.config.priority
    }

    fn available(&self) -> bool {
        self.config.enabled && (!self.requires_credential || self.has_credential())
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_chat: true,
            supports_chat_stream: true,
            supports_embedding: true,
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
            .unwrap_or_else(|| "gpt-4o-mini".to_string());

        let payload = OpenAiChatPayload {
            model: &model,
            messages: &request.messages,
            temperature: request.temperature,
            top_p: request.top_p,
            frequency_penalty: request.frequency_penalty,
            presence_penalty: request.presence_penalty,
            stop: &request.stop,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url());
        let builder = self.authorize(self.client.post(&url).json(&payload));
        let response = builder.send().await.map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_status(status, body));
        }

        let parsed: OpenAiChatResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let usage = Usage::new(parsed.usage.prompt_tokens, parsed.usage.completion_tokens);
        let choices = parsed
            .choices
            .into_iter()
            .map(|c| ChatChoice {
                index: c.index,
                message: ChatMessage::new(Role::Assistant, c.message.content),
                finish_reason: map_finish_reason(&c.finish_reason),
            })
            .collect();

        Ok(ChatResponse {
            id: parsed.id,
            created: parsed.created,
            model: parsed.model,
            choices,
            usage,
            gateway: GatewayMetadata {
                served_by: self.name.clone(),
                requested_model: request.model.clone(),
                latency_ms: started.elapsed().as_millis() as u64,
                cached: false,
                retry_count: 0,
                request_id: ctx.request_id.clone(),
                estimated_cost: self.estimate_cost(&usage),
            },
        })
    }

    async fn chat_stream(&self, request: &ChatRequest, ctx: &ProviderContext) -> Result<ChatStream> {
        let model = request
            .model
            .clone()
            .or_else(|| self.config.default_model.clone())
            .unwrap_or_else(|| "gpt-4o-mini".to_string());

        let payload = OpenAiChatPayload {
            model: &model,
            messages: &request.messages,
            temperature: request.temperature,
            top_p: request.top_p,
            frequency_penalty: request.frequency_penalty,
            presence_penalty: request.presence_penalty,
            stop: &request.stop,
            max_tokens: request.max_tokens,
            stream: true,
        };

        let url = format!("{}/chat/completions", self.base_url());
        let builder = self.authorize(self.client.post(&url).json(&payload));
        let response = builder.send().await.map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_status(status, body));
        }

        let name = self.name.clone();
        let request_id = ctx.request_id.clone();

        let stream = try_stream! {
            use futures_util::StreamExt;
            let mut bytes_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes_stream.next().await {
                let chunk = chunk.map_err(|e| GatewayError::UpstreamTransport {
                    provider: name.clone(),
                    message: e.to_string(),
                })?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    if let Some(data) = line.strip_prefix("data: ") {
                        if data == "[DONE]" {
                            continue;
                        }
                        if let Ok(event) = serde_json::from_str::<ChatStreamEvent>(data) {
                            yield event;
                        }
                    }
                }
            }
            let _ = request_id;
        };

        Ok(Box::pin(stream))
    }

    async fn embed(
        &self,
        request: &EmbeddingRequest,
        ctx: &ProviderContext,
    ) -> Result<EmbeddingResponse> {
        let started = Instant::now();
        let model = request
            .model
            .clone()
            .or_else(|| self.config.default_model.clone())
            .unwrap_or_else(|| "text-embedding-3-small".to_string());

        #[derive(Serialize)]
        struct Payload<'a> {
            model: &'a str,
            input: Vec<&'a str>,
        }

        let url = format!("{}/embeddings", self.base_url());
        let builder = self.authorize(self.client.post(&url).json(&Payload {
            model: &model,
            input: request.input.as_list(),
        }));
        let response = builder.send().await.map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_status(status, body));
        }

        let parsed: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let usage = Usage::new(parsed.usage.prompt_tokens, parsed.usage.completion_tokens);
        let data = parsed
            .data
            .into_iter()
            .map(|d| EmbeddingVector {
                index: d.index,
                embedding: d.embedding,
            })
            .collect();

        Ok(EmbeddingResponse {
            data,
            model: parsed.model,
            usage,
            gateway: GatewayMetadata {
                served_by: self.name.clone(),
                requested_model: request.model.clone(),
                latency_ms: started.elapsed().as_millis() as u64,
                cached: false,
                retry_count: 0,
                request_id: ctx.request_id.clone(),
                estimated_cost: self.estimate_cost(&usage),
            },
        })
    }

    async fn health_check(&self) -> bool {
        let url = if self.requires_credential {
            format!("{}/models", self.base_url())
        } else {
            format!("{}/health", self.base_url())
        };
        let builder = self.authorize(
            self.client
                .get(&url)
                .timeout(Duration::from_secs(8)),
        );
        matches!(builder.send().await, Ok(resp) if resp.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(models: Vec<&str>) -> OpenAiAdapter {
        OpenAiAdapter::new(
            "openai".to_string(),
            ProviderConfig {
                enabled: true,
                priority: Some(10),
                timeout_seconds: 30,
                default_model: None,
                base_url: None,
                api_key: Some("sk-test".to_string()),
                models: models.into_iter().map(String::from).collect(),
                pricing: None,
            },
            true,
        )
    }

    #[test]
    fn unavailable_without_credential() {
        let mut cfg = adapter(vec![]);
        cfg.config.api_key = None;
        assert!(!cfg.available());
    }

    #[test]
    fn empty_model_hint_always_matches() {
        let a = adapter(vec!["gpt-4"]);
        assert!(a.supports_model(None));
    }

    #[test]
    fn model_hint_matches_case_insensitively() {
        let a = adapter(vec!["gpt-4"]);
        assert!(a.supports_model(Some("GPT-4O-MINI")));
        assert!(!a.supports_model(Some("claude-3")));
    }

    #[test]
    fn no_configured_patterns_matches_anything() {
        let a = adapter(vec![]);
        assert!(a.supports_model(Some("anything")));
    }
}
