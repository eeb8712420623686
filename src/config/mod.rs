//! Configuration loading: a YAML document overlaid with `GATEWAY_`-prefixed
//! environment variables, validated once at startup and treated as
//! immutable thereafter.

pub mod models;

pub use models::{
    CacheConfig, CircuitBreakerConfig, Config, LoggingConfig, PricingConfig, ProviderConfig,
    RateLimitConfig, RoutingConfig, ServerConfig,
};

use crate::utils::error::{GatewayError, Result};
use std::path::Path;

/// Load configuration from a YAML file, then apply environment overrides.
///
/// Nested fields are addressed with a double underscore, e.g.
/// `GATEWAY_RATE_LIMIT__REQUESTS_PER_MINUTE=30` overrides
/// `rate_limit.requests_per_minute`. A missing file is not an error — the
/// caller falls back to built-in defaults plus whatever the environment
/// supplies.
pub fn load(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("GATEWAY")
                .separator("__")
                .try_parsing(true),
        );

    let raw = builder
        .build()
        .map_err(|e| GatewayError::Config(e.to_string()))?;

    let cfg: Config = raw
        .try_deserialize()
        .map_err(|e| GatewayError::Config(e.to_string()))?;

    validate(&cfg)?;
    Ok(cfg)
}

/// Startup validation: catches a config that would otherwise fail at the
/// first request instead of at boot.
fn validate(cfg: &Config) -> Result<()> {
    if cfg.server.port == 0 {
        return Err(GatewayError::Config("server.port must be nonzero".into()));
    }

    let enabled_count = cfg.providers.values().filter(|p| p.enabled).count();
    if enabled_count == 0 {
        return Err(GatewayError::Config(
            "at least one provider must be enabled".into(),
        ));
    }

    for (name, provider) in &cfg.providers {
        if provider.enabled && provider.timeout_seconds == 0 {
            return Err(GatewayError::Config(format!(
                "providers.{name}.timeout_seconds must be nonzero"
            )));
        }
    }

    if cfg.circuit_breaker.failure_threshold == 0 {
        return Err(GatewayError::Config(
            "circuit_breaker.failure_threshold must be nonzero".into(),
        ));
    }

    if cfg.rate_limit.enabled && cfg.rate_limit.requests_per_minute == 0 {
        return Err(GatewayError::Config(
            "rate_limit.requests_per_minute must be nonzero when rate limiting is enabled".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fail_validation_without_an_enabled_provider() {
        let cfg = Config::default();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn a_single_enabled_provider_passes_validation() {
        let mut cfg = Config::default();
        cfg.providers.insert(
            "openai".to_string(),
            ProviderConfig {
                enabled: true,
                ..Default::default()
            },
        );
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn zero_timeout_on_an_enabled_provider_fails_validation() {
        let mut cfg = Config::default();
        cfg.providers.insert(
            "openai".to_string(),
            ProviderConfig {
                enabled: true,
                timeout_seconds: 0,
                ..Default::default()
            },
        );
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn loading_a_missing_file_falls_back_to_environment_and_defaults() {
        std::env::set_var("GATEWAY_SERVER__PORT", "9999");
        std::env::set_var("GATEWAY_PROVIDERS__OPENAI__ENABLED", "true");
        let cfg = load("/nonexistent/gateway.yaml").unwrap();
        assert_eq!(cfg.server.port, 9999);
        assert!(cfg.providers.get("openai").map(|p| p.enabled).unwrap_or(false));
        std::env::remove_var("GATEWAY_SERVER__PORT");
        std::env::remove_var("GATEWAY_PROVIDERS__OPENAI__ENABLED");
    }
}
