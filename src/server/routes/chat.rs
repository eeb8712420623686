//! `POST /v1/chat/completions` and `POST /v1/chat/completions/stream`.

use crate::core::types::ChatRequest;
use crate::server::errors::gateway_error_to_response;
use crate::server::identity::extract_identity;
use crate::server::state::AppState;
use crate::utils::error::GatewayError;
use crate::utils::metrics::METRICS;
use actix_web::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use async_stream::stream;
use futures::StreamExt;
use tracing::{error, info};
use uuid::Uuid;

fn validate(request: &ChatRequest) -> Result<(), GatewayError> {
    if request.messages.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "messages must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn stamp_rate_limit_headers(
    mut response: HttpResponse,
    result: &crate::core::rate_limiter::RateLimitResult,
) -> HttpResponse {
    let headers = response.headers_mut();
    headers.insert(
        actix_web::http::header::HeaderName::from_static("x-ratelimit-limit"),
        actix_web::http::header::HeaderValue::from(result.limit),
    );
    headers.insert(
        actix_web::http::header::HeaderName::from_static("x-ratelimit-remaining"),
        actix_web::http::header::HeaderValue::from(result.remaining),
    );
    headers.insert(
        actix_web::http::header::HeaderName::from_static("x-ratelimit-reset"),
        actix_web::http::header::HeaderValue::from(result.reset_seconds),
    );
    response
}

pub async fn chat_completions(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ChatRequest>,
) -> ActixResult<HttpResponse> {
    let request_id = Uuid::new_v4().to_string();
    let mut request = body.into_inner();
    request.caller_id = extract_identity(&req);

    if request.stream {
        return Ok(gateway_error_to_response(GatewayError::InvalidRequest(
            "use /v1/chat/completions/stream for streaming requests".to_string(),
        )));
    }

    if let Err(e) = validate(&request) {
        METRICS
            .requests_total
            .with_label_values(&["chat", "invalid_request"])
            .inc();
        return Ok(gateway_error_to_response(e));
    }

    let rl_result = state.rate_limiter.check_and_record(&request.caller_id);
    if !rl_result.allowed {
        METRICS
            .rate_limit_rejections_total
            .with_label_values(&[request.caller_id.as_str()])
            .inc();
        let resp = gateway_error_to_response(GatewayError::RateLimitExceeded(format!(
            "rate limit exceeded for {}",
            request.caller_id
        )));
        return Ok(stamp_rate_limit_headers(resp, &rl_result));
    }

    let timer = METRICS
        .request_duration_seconds
        .with_label_values(&["chat"])
        .start_timer();

    if let Some(hit) = state.cache.lookup(&request).await {
        METRICS.cache_total.with_label_values(&["hit"]).inc();
        timer.observe_duration();
        let mut response = HttpResponse::Ok().json(hit);
        response.headers_mut().insert(
            actix_web::http::header::HeaderName::from_static("x-request-id"),
            actix_web::http::header::HeaderValue::from_str(&request_id).unwrap(),
        );
        METRICS
            .requests_total
            .with_label_values(&["chat", "200"])
            .inc();
        return Ok(stamp_rate_limit_headers(response, &rl_result));
    }
    METRICS.cache_total.with_label_values(&["miss"]).inc();

    match state.router.route_chat(&request, &request_id).await {
        Ok(response) => {
            timer.observe_duration();
            state.cache.store(&request, &response).await;
            METRICS
                .provider_requests_total
                .with_label_values(&[response.gateway.served_by.as_str(), "success"])
                .inc();
            METRICS
                .requests_total
                .with_label_values(&["chat", "200"])
                .inc();
            let mut http_response = HttpResponse::Ok().json(response);
            http_response.headers_mut().insert(
                actix_web::http::header::HeaderName::from_static("x-request-id"),
                actix_web::http::header::HeaderValue::from_str(&request_id).unwrap(),
            );
            Ok(stamp_rate_limit_headers(http_response, &rl_result))
        }
        Err(e) => {
            timer.observe_duration();
            error!(error = %e, "chat completion failed");
            if let Some(provider) = e.provider() {
                METRICS
                    .provider_requests_total
                    .with_label_values(&[provider, "failure"])
                    .inc();
            }
            METRICS
                .requests_total
                .with_label_values(&["chat", e.code()])
                .inc();
            Ok(stamp_rate_limit_headers(gateway_error_to_response(e), &rl_result))
        }
    }
}

pub async fn chat_completions_stream(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ChatRequest>,
) -> ActixResult<HttpResponse> {
    let request_id = Uuid::new_v4().to_string();
    let mut request = body.into_inner();
    request.caller_id = extract_identity(&req);
    request.stream = true;

    if let Err(e) = validate(&request) {
        return Ok(gateway_error_to_response(e));
    }

    let rl_result = state.rate_limiter.check_and_record(&request.caller_id);
    if !rl_result.allowed {
        let resp = gateway_error_to_response(GatewayError::RateLimitExceeded(format!(
            "rate limit exceeded for {}",
            request.caller_id
        )));
        return Ok(stamp_rate_limit_headers(resp, &rl_result));
    }

    info!(request_id, "starting streaming chat completion");

    let router = state.router.clone();
    let upstream = match router.route_chat_stream(&request, &request_id).await {
        Ok(upstream) => upstream,
        Err(e) => return Ok(gateway_error_to_response(e)),
    };

    let body_stream = stream! {
        let mut upstream = upstream;
        while let Some(event) = upstream.next().await {
            match event {
                Ok(chunk) => {
                    if let Ok(json) = serde_json::to_string(&chunk) {
                        yield Ok::<_, actix_web::Error>(web::Bytes::from(format!("data: {json}\n\n")));
                    }
                }
                Err(e) => {
                    error!(error = %e, "stream terminated early");
                    break;
                }
            }
        }
        yield Ok(web::Bytes::from("data: [DONE]\n\n"));
    };

    Ok(HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, "text/event-stream"))
        .insert_header((CACHE_CONTROL, "no-cache"))
        .streaming(body_stream))
}
