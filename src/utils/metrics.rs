//! Prometheus metrics registry, exposed in text format at `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};

pub struct Metrics {
    pub requests_total: CounterVec,
    pub provider_requests_total: CounterVec,
    pub cache_total: CounterVec,
    pub rate_limit_rejections_total: CounterVec,
    pub request_duration_seconds: HistogramVec,
    pub circuit_breaker_state: GaugeVec,
}

pub static METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

impl Metrics {
    fn new() -> Self {
        Self {
            requests_total: register_counter_vec!(
                "gateway_requests_total",
                "Total ingress requests by route and status",
                &["route", "status"]
            )
            .expect("metric registration"),
            provider_requests_total: register_counter_vec!(
                "gateway_provider_requests_total",
                "Total upstream calls by provider and outcome",
                &["provider", "outcome"]
            )
            .expect("metric registration"),
            cache_total: register_counter_vec!(
                "gateway_cache_total",
                "Cache lookups by outcome (hit/miss)",
                &["outcome"]
            )
            .expect("metric registration"),
            rate_limit_rejections_total: register_counter_vec!(
                "gateway_rate_limit_rejections_total",
                "Requests rejected by the rate limiter",
                &["identifier"]
            )
            .expect("metric registration"),
            request_duration_seconds: register_histogram_vec!(
                "gateway_request_duration_seconds",
                "Ingress request latency by route",
                &["route"]
            )
            .expect("metric registration"),
            circuit_breaker_state: register_gauge_vec!(
                "gateway_circuit_breaker_state",
                "0=closed 1=half-open 2=open",
                &["provider"]
            )
            .expect("metric registration"),
        }
    }
}

/// Renders the default registry in Prometheus text exposition format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .unwrap_or_else(|_| buffer.clear());
    String::from_utf8(buffer).unwrap_or_default()
}

