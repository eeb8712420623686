use super::common::{GatewayMetadata, Usage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

/// The provider-agnostic chat request accepted at the HTTP boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    #[serde(default)]
    pub stop: Vec<String>,
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
    /// Names a specific adapter the caller would prefer; a hint, not a
    /// guarantee — the router silently ignores an unavailable preference.
    pub provider: Option<String>,
    /// Populated by ingress from the identity-extraction policy, not by
    /// the caller's JSON body.
    #[serde(skip_deserializing, default)]
    pub caller_id: String,
}

impl Default for ChatRequest {
    fn default() -> Self {
        Self {
            model: None,
            messages: Vec::new(),
            temperature: default_temperature(),
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            stop: Vec::new(),
            max_tokens: None,
            stream: false,
            provider: None,
            caller_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub id: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
    pub gateway: GatewayMetadata,
}

impl ChatResponse {
    /// A cache entry may only be written for a response that actually
    /// answered the question, per the cache's store contract.
    pub fn is_cacheable(&self) -> bool {
        !self.choices.is_empty()
            && !self
                .choices
                .iter()
                .any(|c| c.finish_reason == FinishReason::Error)
    }
}
