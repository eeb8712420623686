//! `GET /health` and `GET /health/detailed`.

use crate::core::circuit_breaker::CircuitState;
use crate::server::state::AppState;
use actix_web::{web, HttpResponse, Result as ActixResult};
use chrono::Utc;
use serde::Serialize;

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    timestamp: i64,
    service: &'static str,
}

pub async fn health_check() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(HealthStatus {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        service: "ai-gateway",
    }))
}

#[derive(Serialize)]
struct ProviderHealth {
    name: String,
    configured: bool,
    healthy: bool,
    priority: Option<i32>,
    circuit_state: CircuitState,
}

#[derive(Serialize)]
struct DetailedHealth {
    status: &'static str,
    timestamp: i64,
    service: &'static str,
    providers: Vec<ProviderHealth>,
}

pub async fn detailed_health_check(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let mut providers = Vec::new();
    for provider in state.router.providers() {
        providers.push(ProviderHealth {
            name: provider.name().to_string(),
            configured: provider.available(),
            healthy: provider.health_check().await,
            priority: provider.priority(),
            circuit_state: state.router.breaker_state(provider.name()),
        });
    }

    Ok(HttpResponse::Ok().json(DetailedHealth {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        service: "ai-gateway",
        providers,
    }))
}
