//! `GET /v1/models`.

use crate::server::state::AppState;
use actix_web::{web, HttpResponse, Result as ActixResult};
use serde::Serialize;

#[derive(Serialize)]
struct ModelEntry {
    id: String,
    provider: String,
}

pub async fn list_models(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let models: Vec<ModelEntry> = state
        .router
        .providers()
        .iter()
        .filter(|p| p.available())
        .flat_map(|p| {
            p.advertised_models()
                .into_iter()
                .map(|id| ModelEntry {
                    id,
                    provider: p.name().to_string(),
                })
                .collect::<Vec<_>>()
        })
        .collect();

    Ok(HttpResponse::Ok().json(models))
}
