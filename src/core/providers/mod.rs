//! Provider abstraction: one adapter per upstream shape, all implementing
//! the same dyn-compatible `Provider` trait so the router can hold a flat
//! `Vec<Arc<dyn Provider>>` and never match on a concrete adapter kind.

mod claude;
mod gemini;
mod openai;
pub mod pricing;
mod types;

pub use types::{ChatStreamChoice, ChatStreamDelta, ChatStreamEvent, ProviderCapabilities, ProviderContext};

use crate::config::ProviderConfig as ProviderConfigDoc;
use crate::core::types::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse};
use crate::utils::error::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatStreamEvent>> + Send>>;

/// The capability set every candidate is judged against during routing.
/// Implementations must be `Send + Sync` since candidates are shared across
/// concurrently-processed requests.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Lower sorts first; `None` sorts to the end.
    fn priority(&self) -> Option<i32>;

    /// Enabled **and** (if a credential is required) the credential is
    /// non-empty. An adapter that fails this check is constructed but
    /// permanently reports unavailable rather than erroring at startup.
    fn available(&self) -> bool;

    fn capabilities(&self) -> ProviderCapabilities;

    /// Case-insensitive substring match against the adapter's configured
    /// model patterns. A `None` hint always matches.
    fn supports_model(&self, model: Option<&str>) -> bool;

    /// Models this adapter advertises via `GET /v1/models`: its configured
    /// model patterns, or its single default model if none were listed.
    fn advertised_models(&self) -> Vec<String>;

    async fn chat(&self, request: &ChatRequest, ctx: &ProviderContext) -> Result<ChatResponse>;

    async fn chat_stream(&self, request: &ChatRequest, ctx: &ProviderContext) -> Result<ChatStream>;

    async fn embed(
        &self,
        request: &EmbeddingRequest,
        ctx: &ProviderContext,
    ) -> Result<EmbeddingResponse>;

    /// Cheap upstream probe, bounded by a short timeout. Never propagates
    /// an error: a failed probe simply means unhealthy.
    async fn health_check(&self) -> bool;
}

/// Construct the full adapter set from the configuration document. An
/// entry with no matching provider kind is skipped silently — the set of
/// recognized kinds is closed (`openai`, `gemini`, `claude`,
/// `local-worker`).
pub fn build_providers(
    providers: &std::collections::HashMap<String, ProviderConfigDoc>,
) -> Vec<Arc<dyn Provider>> {
    let mut built: Vec<Arc<dyn Provider>> = Vec::new();

    for (name, cfg) in providers {
        let adapter: Arc<dyn Provider> = match name.as_str() {
            "openai" => Arc::new(openai::OpenAiAdapter::new(
                "openai".to_string(),
                cfg.clone(),
                true,
            )),
            "local-worker" => Arc::new(openai::OpenAiAdapter::new(
                "local-worker".to_string(),
                cfg.clone(),
                false,
            )),
            "gemini" => Arc::new(gemini::GeminiAdapter::new(cfg.clone())),
            "claude" => Arc::new(claude::ClaudeAdapter::new(cfg.clone())),
            _ => continue,
        };
        built.push(adapter);
    }

    built
}
