//! Router: candidate selection, retry-with-backoff, and fallback across
//! provider adapters. Streaming bypasses retry/fallback entirely — once
//! bytes have reached the client a replay would duplicate tokens.

use crate::config::RoutingConfig;
use crate::core::circuit_breaker::CircuitBreakerRegistry;
use crate::core::providers::{ChatStream, Provider, ProviderContext};
use crate::core::types::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse};
use crate::utils::error::{GatewayError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct Router {
    providers: Vec<Arc<dyn Provider>>,
    breakers: Arc<CircuitBreakerRegistry>,
    routing: RoutingConfig,
}

impl Router {
    pub fn new(
        providers: Vec<Arc<dyn Provider>>,
        breakers: Arc<CircuitBreakerRegistry>,
        routing: RoutingConfig,
    ) -> Self {
        Self {
            providers,
            breakers,
            routing,
        }
    }

    /// Candidate selection, per the data model: available adapters,
    /// sorted by priority (ties broken by name), preference hint moved to
    /// the head, model-hint filtering with empty-set fallback, and
    /// (for embeddings) capability filtering.
    fn candidates(
        &self,
        preference: Option<&str>,
        model_hint: Option<&str>,
        require_embedding: bool,
    ) -> Vec<Arc<dyn Provider>> {
        let mut candidates: Vec<Arc<dyn Provider>> = self
            .providers
            .iter()
            .filter(|p| p.available())
            .cloned()
            .collect();

        candidates.sort_by(|a, b| {
            let pa = a.priority().unwrap_or(i32::MAX);
            let pb = b.priority().unwrap_or(i32::MAX);
            pa.cmp(&pb).then_with(|| a.name().cmp(b.name()))
        });

        if let Some(preferred) = preference {
            if let Some(pos) = candidates.iter().position(|p| p.name() == preferred) {
                let picked = candidates.remove(pos);
                candidates.insert(0, picked);
            }
        }

        if let Some(model) = model_hint {
            if !model.is_empty() {
                let filtered: Vec<_> = candidates
                    .iter()
                    .filter(|p| p.supports_model(Some(model)))
                    .cloned()
                    .collect();
                if !filtered.is_empty() {
                    candidates = filtered;
                }
            }
        }

        if require_embedding {
            candidates.retain(|p| p.capabilities().supports_embedding);
        }

        if !self.routing.fallback_enabled {
            candidates.truncate(1);
        }

        candidates
    }

    async fn backoff_delay(&self, attempt: u32) {
        let base = self.routing.retry_delay_ms as f64;
        let exp = base * 2f64.powi(attempt as i32 - 1);
        let jitter = exp * 0.1 * (rand::random::<f64>() - 0.5);
        let delay_ms = (exp + jitter).max(0.0) as u64;
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    /// Runs one candidate's retry budget to exhaustion, returning the last
    /// error if every attempt failed. The breaker is consulted before each
    /// attempt and updated after each outcome.
    async fn run_with_retry<T, F, Fut>(
        &self,
        provider: &Arc<dyn Provider>,
        mut call: F,
    ) -> (Result<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let name = provider.name();
        let mut attempts = 0u32;

        loop {
            if !self.breakers.can_execute(name) {
                return (
                    Err(GatewayError::ProviderUnavailable(format!(
                        "circuit open for provider {name}"
                    ))),
                    attempts,
                );
            }

            self.breakers.record_attempt(name);
            attempts += 1;
            let result = call().await;

            match result {
                Ok(value) => {
                    self.breakers.record_success(name);
                    return (Ok(value), attempts - 1);
                }
                Err(error) => {
                    self.breakers.record_failure(name);
                    let retryable = error.is_retryable();
                    if !retryable || attempts > self.routing.max_retries {
                        return (Err(error), attempts - 1);
                    }
                    debug!(provider = name, attempt = attempts, "retrying after transient error");
                    self.backoff_delay(attempts).await;
                }
            }
        }
    }

    pub async fn route_chat(&self, request: &ChatRequest, request_id: &str) -> Result<ChatResponse> {
        let candidates = self.candidates(
            request.provider.as_deref(),
            request.model.as_deref(),
            false,
        );

        if candidates.is_empty() {
            return Err(GatewayError::NoProvidersAvailable(
                "no available provider candidates".to_string(),
            ));
        }

        let ctx = ProviderContext {
            request_id: request_id.to_string(),
        };

        let mut last_error = None;
        let mut hops = 0u32;

        for provider in &candidates {
            let (result, retries) = self
                .run_with_retry(provider, || provider.chat(request, &ctx))
                .await;

            match result {
                Ok(mut response) => {
                    response.gateway.retry_count = retries + hops;
                    return Ok(response);
                }
                Err(error) => {
                    warn!(provider = provider.name(), %error, "candidate failed, considering fallback");
                    last_error = Some(error);
                    hops += 1;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            GatewayError::NoProvidersAvailable("candidate list exhausted".to_string())
        }))
    }

    /// Streaming disables retry/fallback: only the head candidate is
    /// invoked, and its stream is forwarded as-is.
    pub async fn route_chat_stream(
        &self,
        request: &ChatRequest,
        request_id: &str,
    ) -> Result<ChatStream> {
        let candidates = self.candidates(
            request.provider.as_deref(),
            request.model.as_deref(),
            false,
        );

        let provider = candidates
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NoProvidersAvailable("no available provider candidates".to_string()))?;

        if !self.breakers.can_execute(provider.name()) {
            return Err(GatewayError::ProviderUnavailable(format!(
                "circuit open for provider {}",
                provider.name()
            )));
        }

        let ctx = ProviderContext {
            request_id: request_id.to_string(),
        };
        self.breakers.record_attempt(provider.name());
        match provider.chat_stream(request, &ctx).await {
            Ok(stream) => {
                self.breakers.record_success(provider.name());
                Ok(stream)
            }
            Err(error) => {
                self.breakers.record_failure(provider.name());
                Err(error)
            }
        }
    }

    pub async fn route_embedding(
        &self,
        request: &EmbeddingRequest,
        request_id: &str,
    ) -> Result<EmbeddingResponse> {
        let candidates = self.candidates(request.provider.as_deref(), request.model.as_deref(), true);

        if candidates.is_empty() {
            return Err(GatewayError::NoProvidersAvailable(
                "no available embedding-capable provider candidates".to_string(),
            ));
        }

        let ctx = ProviderContext {
            request_id: request_id.to_string(),
        };

        let mut last_error = None;

        for provider in &candidates {
            let (result, _retries) = self
                .run_with_retry(provider, || provider.embed(request, &ctx))
                .await;

            match result {
                Ok(response) => return Ok(response),
                Err(error) => {
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            GatewayError::NoProvidersAvailable("candidate list exhausted".to_string())
        }))
    }

    pub fn provider_snapshot(&self) -> Vec<(String, bool, Option<i32>)> {
        self.providers
            .iter()
            .map(|p| (p.name().to_string(), p.available(), p.priority()))
            .collect()
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    /// Current circuit breaker state for a provider, for the detailed
    /// health endpoint.
    pub fn breaker_state(&self, provider: &str) -> crate::core::circuit_breaker::CircuitState {
        self.breakers.state_of(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::core::providers::{ProviderCapabilities, ProviderContext as Ctx};
    use crate::core::types::{ChatChoice, ChatMessage, FinishReason, GatewayMetadata, Role, Usage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StaticProvider {
        name: &'static str,
        priority: Option<i32>,
        fail_times: AtomicU32,
        embeddable: bool,
        models: Vec<&'static str>,
    }

    #[async_trait]
    impl Provider for StaticProvider {
        fn name(&self) -> &str {
            self.name
        }
        fn priority(&self) -> Option<i32> {
            self.priority
        }
        fn available(&self) -> bool {
            true
        }
        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                supports_chat: true,
                supports_chat_stream: true,
                supports_embedding: self.embeddable,
            }
        }
        fn supports_model(&self, model: Option<&str>) -> bool {
            match model {
                None => true,
                Some(m) => self.models.is_empty() || self.models.iter().any(|p| m.contains(p)),
            }
        }
        fn advertised_models(&self) -> Vec<String> {
            self.models.iter().map(|m| m.to_string()).collect()
        }
        async fn chat(&self, request: &ChatRequest, ctx: &Ctx) -> Result<ChatResponse> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(GatewayError::UpstreamServerError {
                    provider: self.name.to_string(),
                    message: "503".to_string(),
                });
            }
            Ok(ChatResponse {
                id: "id".to_string(),
                created: 0,
                model: request.model.clone().unwrap_or_default(),
                choices: vec![ChatChoice {
                    index: 0,
                    message: ChatMessage::new(Role::Assistant, "ok"),
                    finish_reason: FinishReason::Stop,
                }],
                usage: Usage::new(1, 1),
                gateway: GatewayMetadata {
                    served_by: self.name.to_string(),
                    requested_model: request.model.clone(),
                    latency_ms: 1,
                    cached: false,
                    retry_count: 0,
                    request_id: ctx.request_id.clone(),
                    estimated_cost: None,
                },
            })
        }
        async fn chat_stream(&self, _request: &ChatRequest, _ctx: &Ctx) -> Result<ChatStream> {
            unimplemented!()
        }
        async fn embed(&self, _request: &EmbeddingRequest, _ctx: &Ctx) -> Result<EmbeddingResponse> {
            unimplemented!()
        }
        async fn health_check(&self) -> bool {
            true
        }
    }

    fn routing() -> RoutingConfig {
        RoutingConfig {
            default_provider: None,
            fallback_enabled: true,
            max_retries: 2,
            retry_delay_ms: 1,
        }
    }

    fn breaker_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 100,
            success_threshold: 1,
            min_requests: 100,
            window_seconds: 60,
            open_duration_seconds: 30,
            probe_count: 3,
        }
    }

    #[tokio::test]
    async fn picks_lowest_priority_head_candidate() {
        let providers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(StaticProvider {
                name: "claude",
                priority: Some(20),
                fail_times: AtomicU32::new(0),
                embeddable: false,
                models: vec![],
            }),
            Arc::new(StaticProvider {
                name: "openai",
                priority: Some(10),
                fail_times: AtomicU32::new(0),
                embeddable: true,
                models: vec![],
            }),
        ];
        let router = Router::new(
            providers,
            Arc::new(CircuitBreakerRegistry::new(breaker_config())),
            routing(),
        );
        let request = ChatRequest {
            messages: vec![ChatMessage::new(Role::User, "hi")],
            ..Default::default()
        };
        let response = router.route_chat(&request, "req-1").await.unwrap();
        assert_eq!(response.gateway.served_by, "openai");
    }

    #[tokio::test]
    async fn falls_back_after_retry_budget_exhausted() {
        let providers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(StaticProvider {
                name: "openai",
                priority: Some(10),
                fail_times: AtomicU32::new(10),
                embeddable: true,
                models: vec![],
            }),
            Arc::new(StaticProvider {
                name: "claude",
                priority: Some(20),
                fail_times: AtomicU32::new(0),
                embeddable: false,
                models: vec![],
            }),
        ];
        let router = Router::new(
            providers,
            Arc::new(CircuitBreakerRegistry::new(breaker_config())),
            routing(),
        );
        let request = ChatRequest {
            messages: vec![ChatMessage::new(Role::User, "hi")],
            ..Default::default()
        };
        let response = router.route_chat(&request, "req-1").await.unwrap();
        assert_eq!(response.gateway.served_by, "claude");
        assert_eq!(response.gateway.retry_count, 1);
    }

    #[tokio::test]
    async fn fallback_disabled_truncates_to_head_and_surfaces_its_error() {
        let providers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(StaticProvider {
                name: "openai",
                priority: Some(10),
                fail_times: AtomicU32::new(10),
                embeddable: true,
                models: vec![],
            }),
            Arc::new(StaticProvider {
                name: "claude",
                priority: Some(20),
                fail_times: AtomicU32::new(0),
                embeddable: false,
                models: vec![],
            }),
        ];
        let mut cfg = routing();
        cfg.fallback_enabled = false;
        let router = Router::new(
            providers,
            Arc::new(CircuitBreakerRegistry::new(breaker_config())),
            cfg,
        );
        let request = ChatRequest {
            messages: vec![ChatMessage::new(Role::User, "hi")],
            ..Default::default()
        };
        let result = router.route_chat(&request, "req-1").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn model_hint_filters_candidates_even_against_priority() {
        let providers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(StaticProvider {
                name: "openai",
                priority: Some(5),
                fail_times: AtomicU32::new(0),
                embeddable: true,
                models: vec!["gpt"],
            }),
            Arc::new(StaticProvider {
                name: "gemini",
                priority: Some(20),
                fail_times: AtomicU32::new(0),
                embeddable: true,
                models: vec!["gemini"],
            }),
        ];
        let router = Router::new(
            providers,
            Arc::new(CircuitBreakerRegistry::new(breaker_config())),
            routing(),
        );
        let request = ChatRequest {
            model: Some("gemini-1.5-flash".to_string()),
            messages: vec![ChatMessage::new(Role::User, "hi")],
            ..Default::default()
        };
        let response = router.route_chat(&request, "req-1").await.unwrap();
        assert_eq!(response.gateway.served_by, "gemini");
    }

    #[tokio::test]
    async fn embedding_routing_excludes_claude_shaped_adapters() {
        let providers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(StaticProvider {
                name: "claude",
                priority: Some(1),
                fail_times: AtomicU32::new(0),
                embeddable: false,
                models: vec![],
            }),
            Arc::new(StaticProvider {
                name: "openai",
                priority: Some(10),
                fail_times: AtomicU32::new(0),
                embeddable: true,
                models: vec![],
            }),
        ];
        let router = Router::new(
            providers,
            Arc::new(CircuitBreakerRegistry::new(breaker_config())),
            routing(),
        );
        let candidates = router.candidates(None, None, true);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name(), "openai");
    }
}
