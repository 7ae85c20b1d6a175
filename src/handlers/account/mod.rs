mod phone;
mod profile;
mod transactions;

pub use phone::*;
pub use profile::*;
pub use transactions::*;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::config::RateLimits;
use crate::db::AppState;
use crate::middleware::session_auth;
use crate::rate_limit;

pub fn router(state: AppState, limits: RateLimits) -> Router<AppState> {
    // Code requests send SMS through the provider, so they sit in the
    // strict tier.
    let strict = Router::new()
        .route("/account/phone/request-code", post(request_phone_code))
        .layer(rate_limit::strict_layer(limits.strict_rpm));

    let standard = Router::new()
        .route("/account", get(get_account))
        .route("/account", patch(update_account))
        .route("/account/transactions", get(list_transactions))
        .route("/account/phone/verify", post(verify_phone_code))
        .layer(rate_limit::standard_layer(limits.standard_rpm));

    strict
        .merge(standard)
        .layer(middleware::from_fn_with_state(state, session_auth))
}
