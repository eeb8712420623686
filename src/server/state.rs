//! Application state shared across HTTP handlers.

use crate::config::Config;
use crate::core::cache::ResponseCache;
use crate::core::circuit_breaker::CircuitBreakerRegistry;
use crate::core::providers::build_providers;
use crate::core::rate_limiter::RateLimiter;
use crate::core::router::Router;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub router: Arc<Router>,
    pub cache: Arc<ResponseCache>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let providers = build_providers(&config.providers);
        let breakers = Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.clone()));
        let router = Arc::new(Router::new(providers, breakers, config.routing.clone()));
        let cache = Arc::new(ResponseCache::new(
            config.cache.enabled,
            config.cache.ttl_seconds,
            config.cache.max_size,
        ));
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit.enabled,
            config.rate_limit.requests_per_minute,
        ));

        Self {
            config: Arc::new(config),
            router,
            cache,
            rate_limiter,
        }
    }
}
