//! `GET /metrics` — Prometheus text exposition format.

use crate::utils::metrics::render;
use actix_web::{HttpResponse, Result as ActixResult};

pub async fn metrics() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(render()))
}
