//! The request-routing pipeline: provider adapters, circuit breaking,
//! routing/fallback, the response cache, and the rate limiter.

pub mod cache;
pub mod circuit_breaker;
pub mod providers;
pub mod rate_limiter;
pub mod router;
pub mod types;
