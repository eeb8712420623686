//! Response cache: deterministic SHA-256 fingerprint over the canonical
//! chat shape, TTL-bounded, backed by an in-memory `moka` cache.

use crate::core::types::{ChatRequest, ChatResponse};
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::time::Duration;

const KEY_PREFIX: &str = "ai:cache:";

/// Builds the canonical fingerprint string. Deliberately ignores top-p,
/// penalties, max-tokens and user — two requests differing only in those
/// fields are equivalent for caching purposes. See DESIGN.md.
fn fingerprint_string(request: &ChatRequest) -> String {
    let mut out = String::new();
    out.push_str(request.model.as_deref().unwrap_or("default"));
    out.push('|');
    out.push_str(&request.temperature.to_string());
    out.push('|');
    for message in &request.messages {
        let role = match message.role {
            crate::core::types::Role::System => "system",
            crate::core::types::Role::User => "user",
            crate::core::types::Role::Assistant => "assistant",
        };
        out.push_str(role);
        out.push(':');
        out.push_str(&message.content);
        out.push('|');
    }
    out
}

/// The cache key: `ai:cache:` followed by the first 32 hex characters of
/// the SHA-256 digest over the fingerprint string.
pub fn cache_key(request: &ChatRequest) -> String {
    let fingerprint = fingerprint_string(request);
    let digest = Sha256::digest(fingerprint.as_bytes());
    let hex = hex::encode(digest);
    format!("{}{}", KEY_PREFIX, &hex[..32])
}

pub struct ResponseCache {
    enabled: bool,
    ttl: Duration,
    store: Cache<String, ChatResponse>,
}

impl ResponseCache {
    pub fn new(enabled: bool, ttl_seconds: u64, max_size: u64) -> Self {
        let store = Cache::builder()
            .max_capacity(max_size)
            .time_to_live(Duration::from_secs(ttl_seconds))
            .build();
        Self {
            enabled,
            ttl: Duration::from_secs(ttl_seconds),
            store,
        }
    }

    /// Chat-only, non-stream-only lookup. A hit is stamped `cached=true`
    /// on the gateway-metadata block before being handed back.
    pub async fn lookup(&self, request: &ChatRequest) -> Option<ChatResponse> {
        if !self.enabled || request.stream {
            return None;
        }
        let key = cache_key(request);
        let mut hit = self.store.get(&key).await?;
        hit.gateway.cached = true;
        Some(hit)
    }

    /// Refuses to cache a response with no choices, any error-finished
    /// choice, or one produced for a streaming request. Concurrent,
    /// duplicate stores are harmless: the fingerprint is deterministic so
    /// the only difference between two stores for the same request is the
    /// gateway-metadata block, and last-writer-wins is acceptable there.
    pub async fn store(&self, request: &ChatRequest, response: &ChatResponse) {
        if !self.enabled || request.stream || !response.is_cacheable() {
            return;
        }
        let key = cache_key(request);
        self.store.insert(key, response.clone()).await;
    }

    /// Bulk-invalidate every key whose suffix (after the `ai:cache:`
    /// prefix) contains `pattern` as a substring. Returns the number of
    /// entries removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        let mut cleared = 0u64;
        let matching: Vec<String> = self
            .store
            .iter()
            .filter(|(k, _)| k.contains(pattern))
            .map(|(k, _)| (*k).clone())
            .collect();
        for key in matching {
            self.store.invalidate(&key).await;
            cleared += 1;
        }
        cleared
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
