//! Maps a `GatewayError` onto an HTTP status and the structured
//! `{error: {type, message, code}}` body the ingress contract promises.

use crate::utils::error::GatewayError;
use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: &'static str,
    message: String,
    code: &'static str,
}

pub fn gateway_error_to_response(error: GatewayError) -> HttpResponse {
    let body = ErrorBody {
        error: ErrorDetail {
            kind: error.kind(),
            message: error.to_string(),
            code: error.code(),
        },
    };

    match &error {
        GatewayError::InvalidRequest(_) | GatewayError::CapabilityUnsupported(_) => {
            HttpResponse::BadRequest().json(body)
        }
        GatewayError::RateLimitExceeded(_) => HttpResponse::TooManyRequests().json(body),
        GatewayError::NoProvidersAvailable(_) => HttpResponse::ServiceUnavailable().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}
