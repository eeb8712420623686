//! Admin operations: cache invalidation and rate-limit bucket inspection.

use crate::server::state::AppState;
use actix_web::{web, HttpResponse, Result as ActixResult};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct InvalidateQuery {
    pattern: String,
}

#[derive(Serialize)]
struct InvalidateResponse {
    status: &'static str,
    cleared: u64,
}

pub async fn invalidate_cache(
    state: web::Data<AppState>,
    query: web::Query<InvalidateQuery>,
) -> ActixResult<HttpResponse> {
    let cleared = state.cache.invalidate_pattern(&query.pattern).await;
    Ok(HttpResponse::Ok().json(InvalidateResponse {
        status: "ok",
        cleared,
    }))
}

#[derive(Serialize)]
struct RateLimitStatus {
    identifier: String,
    limit: u32,
    remaining: u32,
    reset_seconds: u64,
}

pub async fn get_rate_limit(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let identifier = path.into_inner();
    let snapshot = state.rate_limiter.snapshot(&identifier);
    Ok(HttpResponse::Ok().json(RateLimitStatus {
        identifier,
        limit: snapshot.limit,
        remaining: snapshot.remaining,
        reset_seconds: snapshot.reset_seconds,
    }))
}

pub async fn reset_rate_limit(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let identifier = path.into_inner();
    state.rate_limiter.reset(&identifier);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "reset" })))
}
