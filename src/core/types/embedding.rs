use super::common::{GatewayMetadata, Usage};
use serde::{Deserialize, Serialize};

/// Either a single string or a batch, as the HTTP boundary accepts both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

impl EmbeddingInput {
    /// Normalizes to an ordered list regardless of which shape the caller sent.
    pub fn as_list(&self) -> Vec<&str> {
        match self {
            EmbeddingInput::Single(s) => vec![s.as_str()],
            EmbeddingInput::Batch(v) => v.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            EmbeddingInput::Single(s) => s.is_empty(),
            EmbeddingInput::Batch(v) => v.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingRequest {
    pub input: EmbeddingInput,
    pub model: Option<String>,
    pub provider: Option<String>,
    #[serde(skip_deserializing, default)]
    pub caller_id: String,
}

impl Default for EmbeddingRequest {
    fn default() -> Self {
        Self {
            input: EmbeddingInput::Batch(Vec::new()),
            model: None,
            provider: None,
            caller_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingVector {
    pub index: u32,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingVector>,
    pub model: String,
    pub usage: Usage,
    pub gateway: GatewayMetadata,
}
