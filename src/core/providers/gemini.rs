//! Restructured-content adapter: Gemini-shaped upstream. System messages
//! are folded into the first user message because Gemini has no system
//! role; credential travels as a query parameter, not a header.

use super::pricing::estimate_cost;
use super::{ChatStream, ChatStreamEvent, Provider, ProviderCapabilities, ProviderContext};
use crate::config::ProviderConfig;
use crate::core::types::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse,
    EmbeddingVector, FinishReason, GatewayMetadata, Role, Usage,
};
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;
use futures::stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct GeminiChatPayload {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbeddingResponse {
    embedding: GeminiEmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbeddingValues {
    values: Vec<f32>,
}

fn map_finish_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        Some("STOP") | None => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") | Some("RECITATION") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

/// Folds leading system messages into the first following user message,
/// mapping `assistant -> model` for everything else. See the data model's
/// restructured-content rule.
fn fold_messages(messages: &[ChatMessage]) -> Vec<GeminiContent> {
    let mut system_texts = Vec::new();
    let mut idx = 0;
    while idx < messages.len() && messages[idx].role == Role::System {
        system_texts.push(messages[idx].content.as_str());
        idx += 1;
    }
    let system_prefix = system_texts.join("\n\n");

    let mut contents: Vec<(&'static str, String)> = Vec::new();
    let mut prefixed = false;

    for message in &messages[idx..] {
        let role = match message.role {
            Role::Assistant => "model",
            _ => "user",
        };
        let text = if !prefixed && role == "user" && !system_prefix.is_empty() {
            prefixed = true;
            format!("{}\n\n{}", system_prefix, message.content)
        } else {
            message.content.clone()
        };
        contents.push((role, text));
    }

    if !prefixed && !system_prefix.is_empty() {
        contents.insert(0, ("user", system_prefix.clone()));
    }

    contents
        .into_iter()
        .map(|(role, text)| GeminiContent {
            role,
            parts: vec![GeminiPart { text }],
        })
        .collect()
}

pub struct GeminiAdapter {
    config: ProviderConfig,
    client: Client,
}

impl GeminiAdapter {
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
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string())
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
                provider: self.name_string(),
                message,
            }
        } else if status.is_server_error() {
            GatewayError::UpstreamServerError {
                provider: self.name_string(),
                message,
            }
        } else {
            GatewayError::UpstreamClientError {
                provider: self.name_string(),
                message,
            }
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::UpstreamTimeout {
                provider: self.name_string(),
                message: e.to_string(),
            }
        } else {
            GatewayError::UpstreamTransport {
                provider: self.name_string(),
                message: e.to_string(),
            }
        }
    }

    fn name_string(&self) -> String {
        "gemini".to_string()
    }
}

#[async_trait]
impl Provider for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
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
            .unwrap_or_else(|| "gemini-1.5-flash".to_string());

        let payload = GeminiChatPayload {
            contents: fold_messages(&request.messages),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                top_p: request.top_p,
                max_output_tokens: request.max_tokens,
            },
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url(),
            model,
            self.config.api_key.clone().unwrap_or_default()
        );

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_status(status, body));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let usage = parsed
            .usage_metadata
            .map(|u| Usage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        let choices: Vec<ChatChoice> = parsed
            .candidates
            .into_iter()
            .enumerate()
            .map(|(i, candidate)| {
                let text = candidate
                    .content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("");
                ChatChoice {
                    index: i as u32,
                    message: ChatMessage::new(Role::Assistant, text),
                    finish_reason: map_finish_reason(candidate.finish_reason.as_deref()),
                }
            })
            .collect();

        Ok(ChatResponse {
            id: ctx.request_id.clone(),
            created: chrono::Utc::now().timestamp(),
            model,
            choices,
            usage,
            gateway: GatewayMetadata {
                served_by: "gemini".to_string(),
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
        // Gemini's streaming endpoint speaks a distinct newline-delimited
        // JSON shape; for the gateway's purposes a single synthesized
        // event carrying the full response is indistinguishable to the
        // client as long as finish_reason arrives on the final event. We
        // build the full response then replay it as one content event
        // followed by a finish event, matching the event ordering the
        // ingress layer expects.
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
        request: &EmbeddingRequest,
        ctx: &ProviderContext,
    ) -> Result<EmbeddingResponse> {
        let started = Instant::now();
        let model = request
            .model
            .clone()
            .or_else(|| self.config.default_model.clone())
            .unwrap_or_else(|| "embedding-001".to_string());

        let inputs = request.input.as_list();
        let mut vectors = Vec::with_capacity(inputs.len());

        for (index, text) in inputs.iter().enumerate() {
            #[derive(Serialize)]
            struct Content {
                parts: Vec<GeminiPart>,
            }
            #[derive(Serialize)]
            struct Payload {
                content: Content,
            }

            let url = format!(
                "{}/models/{}:embedContent?key={}",
                self.base_url(),
                model,
                self.config.api_key.clone().unwrap_or_default()
            );
            let response = self
                .client
                .post(&url)
                .json(&Payload {
                    content: Content {
                        parts: vec![GeminiPart {
                            text: text.to_string(),
                        }],
                    },
                })
                .send()
                .await
                .map_err(|e| self.map_transport_error(e))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(self.classify_status(status, body));
            }

            let parsed: GeminiEmbeddingResponse = response
                .json()
                .await
                .map_err(|e| self.map_transport_error(e))?;

            vectors.push(EmbeddingVector {
                index: index as u32,
                embedding: parsed.embedding.values,
            });
        }

        let usage = Usage::default();
        Ok(EmbeddingResponse {
            data: vectors,
            model,
            usage,
            gateway: GatewayMetadata {
                served_by: "gemini".to_string(),
                requested_model: request.model.clone(),
                latency_ms: started.elapsed().as_millis() as u64,
                cached: false,
                retry_count: 0,
                request_id: ctx.request_id.clone(),
                estimated_cost: estimate_cost(self.config.pricing.as_ref(), &usage),
            },
        })
    }

    async fn health_check(&self) -> bool {
        let url = format!(
            "{}/models?key={}",
            self.base_url(),
            self.config.api_key.clone().unwrap_or_default()
        );
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(8))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;

    fn msg(role: Role, content: &str) -> ChatMessage {
        ChatMessage::new(role, content)
    }

    #[test]
    fn leading_system_messages_fold_into_first_user_message() {
        let messages = vec![
            msg(Role::System, "A"),
            msg(Role::System, "B"),
            msg(Role::User, "Q"),
        ];
        let folded = fold_messages(&messages);
        assert_eq!(folded.len(), 1);
        assert_eq!(folded[0].role, "user");
        assert_eq!(folded[0].parts[0].text, "A\n\nB\n\nQ");
    }

    #[test]
    fn system_only_conversation_becomes_synthetic_user_message() {
        let messages = vec![msg(Role::System, "only system")];
        let folded = fold_messages(&messages);
        assert_eq!(folded.len(), 1);
        assert_eq!(folded[0].role, "user");
        assert_eq!(folded[0].parts[0].text, "only system");
    }

    #[test]
    fn assistant_messages_map_to_model_role() {
        let messages = vec![msg(Role::User, "hi"), msg(Role::Assistant, "hello")];
        let folded = fold_messages(&messages);
        assert_eq!(folded[1].role, "model");
    }

    #[test]
    fn no_system_messages_leaves_content_untouched() {
        let messages = vec![msg(Role::User, "Q")];
        let folded = fold_messages(&messages);
        assert_eq!(folded.len(), 1);
        assert_eq!(folded[0].parts[0].text, "Q");
    }
}
