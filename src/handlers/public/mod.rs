mod auth;
mod catalog;
mod demo;

pub use auth::*;
pub use catalog::*;
pub use demo::*;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::config::RateLimits;
use crate::db::AppState;
use crate::rate_limit;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(limits: RateLimits) -> Router<AppState> {
    let relaxed = Router::new()
        .route("/health", get(health))
        .route("/influencers", get(list_influencers))
        .route("/influencers/{slug}", get(get_influencer))
        .route("/minute-packs", get(list_minute_packs))
        .layer(rate_limit::relaxed_layer(limits.relaxed_rpm));

    let standard = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/calls/demo", post(log_demo_call))
        .layer(rate_limit::standard_layer(limits.standard_rpm));

    relaxed.merge(standard)
}
