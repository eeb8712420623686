//! Canonical request/response shapes shared by every adapter, the router,
//! and the cache. These are the provider-independent wire types described
//! in the data model: nothing in this module knows about OpenAI, Gemini
//! or Claude specifically.

mod chat;
mod common;
mod embedding;

pub use chat::{ChatChoice, ChatMessage, ChatRequest, ChatResponse, FinishReason, Role};
pub use common::{GatewayMetadata, Usage};
pub use embedding::{EmbeddingInput, EmbeddingRequest, EmbeddingResponse, EmbeddingVector};
