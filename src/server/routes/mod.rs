pub mod admin;
pub mod chat;
pub mod embeddings;
pub mod health;
pub mod metrics;
pub mod models;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1")
            .route("/chat/completions", web::post().to(chat::chat_completions))
            .route(
                "/chat/completions/stream",
                web::post().to(chat::chat_completions_stream),
            )
            .route("/embeddings", web::post().to(embeddings::embeddings))
            .route("/models", web::get().to(models::list_models)),
    )
    .route("/health", web::get().to(health::health_check))
    .route("/health/detailed", web::get().to(health::detailed_health_check))
    .route("/metrics", web::get().to(metrics::metrics))
    .service(
        web::scope("/admin")
            .route("/cache", web::delete().to(admin::invalidate_cache))
            .route("/ratelimit/{id}", web::get().to(admin::get_rate_limit))
            .route("/ratelimit/{id}", web::delete().to(admin::reset_rate_limit)),
    );
}
