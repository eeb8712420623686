//! Typed configuration document bound from `config/gateway.yaml` plus
//! environment overrides.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_tokens_per_minute() -> u32 {
    100_000
}

fn default_cache_ttl_seconds() -> u64 {
    3600
}

fn default_cache_max_size() -> u64 {
    10_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_min_requests() -> u32 {
    10
}

fn default_window_seconds() -> u64 {
    60
}

fn default_open_duration_seconds() -> u64 {
    30
}

fn default_probe_count() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level gateway configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    /// Keyed by provider name: "openai", "gemini", "claude", "local-worker".
    pub providers: HashMap<String, ProviderConfig>,
    pub routing: RoutingConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            providers: HashMap::new(),
            routing: RoutingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Per-provider pricing, USD per 1k tokens.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PricingConfig {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

/// Static descriptor for one adapter, as described in spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Precedence key; lower sorts first. `None` sorts to the end.
    pub priority: Option<i32>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    pub default_model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Case-insensitive substring patterns matched against a model hint.
    #[serde(default)]
    pub models: Vec<String>,
    pub pricing: Option<PricingConfig>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            priority: None,
            timeout_seconds: default_timeout_seconds(),
            default_model: None,
            base_url: None,
            api_key: None,
            models: Vec::new(),
            pricing: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub default_provider: Option<String>,
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            fallback_enabled: true,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_tokens_per_minute")]
    pub tokens_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: default_requests_per_minute(),
            tokens_per_minute: default_tokens_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_cache_max_size")]
    pub max_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: default_cache_ttl_seconds(),
            max_size: default_cache_max_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "default_min_requests")]
    pub min_requests: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "default_open_duration_seconds")]
    pub open_duration_seconds: u64,
    #[serde(default = "default_probe_count")]
    pub probe_count: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            min_requests: default_min_requests(),
            window_seconds: default_window_seconds(),
            open_duration_seconds: default_open_duration_seconds(),
            probe_count: default_probe_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
