//! `POST /v1/embeddings`.

use crate::core::types::EmbeddingRequest;
use crate::server::errors::gateway_error_to_response;
use crate::server::identity::extract_identity;
use crate::server::state::AppState;
use crate::utils::error::GatewayError;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use uuid::Uuid;

fn validate(request: &EmbeddingRequest) -> Result<(), GatewayError> {
    if request.input.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "input must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn stamp_headers(
    mut response: HttpResponse,
    result: &crate::core::rate_limiter::RateLimitResult,
    request_id: &str,
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
    headers.insert(
        actix_web::http::header::HeaderName::from_static("x-request-id"),
        actix_web::http::header::HeaderValue::from_str(request_id).unwrap(),
    );
    response
}

pub async fn embeddings(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<EmbeddingRequest>,
) -> ActixResult<HttpResponse> {
    let request_id = Uuid::new_v4().to_string();
    let mut request = body.into_inner();
    request.caller_id = extract_identity(&req);

    if let Err(e) = validate(&request) {
        return Ok(gateway_error_to_response(e));
    }

    let rl_result = state.rate_limiter.check_and_record(&request.caller_id);
    if !rl_result.allowed {
        let resp = gateway_error_to_response(GatewayError::RateLimitExceeded(format!(
            "rate limit exceeded for {}",
            request.caller_id
        )));
        return Ok(stamp_headers(resp, &rl_result, &request_id));
    }

    match state.router.route_embedding(&request, &request_id).await {
        Ok(response) => Ok(stamp_headers(
            HttpResponse::Ok().json(response),
            &rl_result,
            &request_id,
        )),
        Err(e) => Ok(stamp_headers(
            gateway_error_to_response(e),
            &rl_result,
            &request_id,
        )),
    }
}
