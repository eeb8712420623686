//! End-to-end HTTP tests: real `actix-web` app wired to `AppState`, real
//! request/response bodies, upstream providers replaced by `wiremock`
//! servers. These drive the concrete scenarios from the routing and
//! caching design rather than calling internals directly.

use actix_web::{test, web, App};
use ai_gateway::config::{
    CacheConfig, CircuitBreakerConfig, Config, ProviderConfig, RateLimitConfig, RoutingConfig,
};
use ai_gateway::server::{routes, AppState};
use serde_json::json;
use std::collections::HashMap;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(base_url: &str, priority: i32) -> ProviderConfig {
    ProviderConfig {
        enabled: true,
        priority: Some(priority),
        timeout_seconds: 5,
        default_model: Some("gpt-4o-mini".to_string()),
        base_url: Some(base_url.to_string()),
        api_key: Some("test-key".to_string()),
        models: Vec::new(),
        pricing: None,
    }
}

fn config(providers: HashMap<String, ProviderConfig>) -> Config {
    Config {
        providers,
        routing: RoutingConfig {
            default_provider: None,
            fallback_enabled: true,
            max_retries: 1,
            retry_delay_ms: 1,
        },
        rate_limit: RateLimitConfig {
            enabled: true,
            requests_per_minute: 60,
            tokens_per_minute: 100_000,
        },
        cache: CacheConfig {
            enabled: true,
            ttl_seconds: 3600,
            max_size: 1000,
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 100,
            success_threshold: 1,
            min_requests: 100,
            window_seconds: 60,
            open_duration_seconds: 30,
            probe_count: 3,
        },
        ..Config::default()
    }
}

fn success_body() -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "created": 1,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Hello there"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
    })
}

#[actix_web::test]
async fn happy_path_routes_to_primary_provider() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .mount(&openai)
        .await;

    let mut providers = HashMap::new();
    providers.insert("openai".to_string(), provider(&openai.uri(), 10));
    let state = web::Data::new(AppState::new(config(providers)));

    let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;

    let req = test::TestRequest::post()
        .uri("/v1/chat/completions")
        .set_json(json!({"model": "gpt-4o-mini", "messages": [{"role": "user", "content": "Hi"}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("x-ratelimit-remaining"));
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["gateway"]["served_by"], "openai");
    assert_eq!(body["gateway"]["cached"], false);
    assert_eq!(body["gateway"]["retry_count"], 0);
}

#[actix_web::test]
async fn fallback_to_secondary_after_primary_exhausts_retries() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&openai)
        .await;

    let claude = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .mount(&claude)
        .await;

    let mut providers = HashMap::new();
    providers.insert("openai".to_string(), provider(&openai.uri(), 10));
    providers.insert("local-worker".to_string(), provider(&claude.uri(), 20));
    let mut cfg = config(providers);
    cfg.providers.get_mut("local-worker").unwrap().default_model = Some("gpt-4o-mini".to_string());
    let state = web::Data::new(AppState::new(cfg));

    let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;

    let req = test::TestRequest::post()
        .uri("/v1/chat/completions")
        .set_json(json!({"model": "gpt-4o-mini", "messages": [{"role": "user", "content": "Hi"}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["gateway"]["served_by"], "local-worker");
    assert_eq!(body["gateway"]["retry_count"], 1);
}

#[actix_web::test]
async fn identical_requests_hit_cache_on_second_call() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .up_to_n_times(1)
        .mount(&openai)
        .await;

    let mut providers = HashMap::new();
    providers.insert("openai".to_string(), provider(&openai.uri(), 10));
    let state = web::Data::new(AppState::new(config(providers)));

    let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;

    let make_req = || {
        test::TestRequest::post()
            .uri("/v1/chat/completions")
            .set_json(json!({"model": "gpt-4o-mini", "messages": [{"role": "user", "content": "Hi"}]}))
            .to_request()
    };

    let first = test::call_service(&app, make_req()).await;
    assert_eq!(first.status(), 200);
    let first_body: serde_json::Value = test::read_body_json(first).await;
    assert_eq!(first_body["gateway"]["cached"], false);

    let second = test::call_service(&app, make_req()).await;
    assert_eq!(second.status(), 200);
    let second_body: serde_json::Value = test::read_body_json(second).await;
    assert_eq!(second_body["gateway"]["cached"], true);
    assert_eq!(second_body["choices"], first_body["choices"]);
    assert_eq!(second_body["usage"], first_body["usage"]);
}

#[actix_web::test]
async fn third_request_over_capacity_is_rate_limited() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .mount(&openai)
        .await;

    let mut providers = HashMap::new();
    providers.insert("openai".to_string(), provider(&openai.uri(), 10));
    let mut cfg = config(providers);
    cfg.rate_limit.requests_per_minute = 2;
    let state = web::Data::new(AppState::new(cfg));

    let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;

    let make_req = |content: &str| {
        test::TestRequest::post()
            .uri("/v1/chat/completions")
            .set_json(json!({"model": "gpt-4o-mini", "messages": [{"role": "user", "content": content}]}))
            .to_request()
    };

    let r1 = test::call_service(&app, make_req("one")).await;
    assert_eq!(r1.status(), 200);
    let r2 = test::call_service(&app, make_req("two")).await;
    assert_eq!(r2.status(), 200);

    let r3 = test::call_service(&app, make_req("three")).await;
    assert_eq!(r3.status(), 429);
    assert_eq!(r3.headers().get("x-ratelimit-remaining").unwrap(), "0");
    let body: serde_json::Value = test::read_body_json(r3).await;
    assert_eq!(body["error"]["code"], "rate_limit_exceeded");
}

#[actix_web::test]
async fn model_hint_routes_around_higher_priority_provider() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "hi from gemini"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2}
        })))
        .mount(&gemini)
        .await;

    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .mount(&openai)
        .await;

    let mut providers = HashMap::new();
    let mut openai_cfg = provider(&openai.uri(), 1);
    openai_cfg.models = vec!["gpt".to_string()];
    providers.insert("openai".to_string(), openai_cfg);

    let mut gemini_cfg = provider(&gemini.uri(), 20);
    gemini_cfg.models = vec!["gemini".to_string()];
    providers.insert("gemini".to_string(), gemini_cfg);

    let state = web::Data::new(AppState::new(config(providers)));
    let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;

    let req = test::TestRequest::post()
        .uri("/v1/chat/completions")
        .set_json(json!({"model": "gemini-1.5-flash", "messages": [{"role": "user", "content": "Hi"}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["gateway"]["served_by"], "gemini");
}
