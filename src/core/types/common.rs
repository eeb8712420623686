use serde::{Deserialize, Serialize};

/// Token usage as reported by (or derived from) the upstream.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Block the router attaches to every response it hands back, success or
/// cache-hit. Never constructed by an adapter directly except for the
/// fields an adapter is positioned to know (latency, cost); the router
/// fills in the rest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayMetadata {
    /// Name of the adapter that actually served the request.
    pub served_by: String,
    /// The model hint the caller supplied, verbatim, before any defaulting.
    pub requested_model: Option<String>,
    pub latency_ms: u64,
    pub cached: bool,
    pub retry_count: u32,
    pub request_id: String,
    pub estimated_cost: Option<f64>,
}
