use crate::core::types::FinishReason;
use serde::{Deserialize, Serialize};

/// Capability set a candidate is judged against during routing. Deliberately
/// flat — the router never downcasts to a concrete adapter kind, it only
/// ever asks these questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    pub supports_chat: bool,
    pub supports_chat_stream: bool,
    pub supports_embedding: bool,
}

/// Per-call context the router threads through to an adapter: identifiers
/// the adapter cannot itself know.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub request_id: String,
}

/// One element of a streaming chat response, shaped like the OpenAI
/// chat-completions delta event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamEvent {
    pub id: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatStreamChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChoice {
    pub index: u32,
    pub delta: ChatStreamDelta,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatStreamDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatStreamEvent {
    pub fn content_delta(id: &str, created: i64, model: &str, index: u32, text: &str) -> Self {
        Self {
            id: id.to_string(),
            created,
            model: model.to_string(),
            choices: vec![ChatStreamChoice {
                index,
                delta: ChatStreamDelta {
                    role: None,
                    content: Some(text.to_string()),
                },
                finish_reason: None,
            }],
        }
    }

    pub fn finish(id: &str, created: i64, model: &str, index: u32, reason: FinishReason) -> Self {
        Self {
            id: id.to_string(),
            created,
            model: model.to_string(),
            choices: vec![ChatStreamChoice {
                index,
                delta: ChatStreamDelta::default(),
                finish_reason: Some(reason),
            }],
        }
    }
}
