mod stripe;
mod twilio;

pub use stripe::handle_stripe_webhook;
pub use twilio::handle_call_status;

use axum::{routing::post, Router};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/stripe", post(handle_stripe_webhook))
        .route("/webhooks/twilio/call-status", post(handle_call_status))
}
