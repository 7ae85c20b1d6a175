use axum::extract::State;
use axum::{middleware, routing::post, Extension, Router};
use serde::{Deserialize, Serialize};

use crate::config::RateLimits;
use crate::db::{queries, AppState};
use crate::error::{msg, OptionExt, Result};
use crate::extractors::Json;
use crate::middleware::{session_auth, AuthContext};
use crate::models::CreatePaymentSession;
use crate::rate_limit;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub minute_pack_id: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub session_id: String,
}

/// Start a checkout for a minute pack.
///
/// Price and minute count come from the pack row, never from the client.
/// The payment session snapshots both so a pack price change mid-checkout
/// cannot shift what the webhook credits.
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let pack = {
        let conn = state.db.get()?;
        queries::get_minute_pack_by_id(&conn, &request.minute_pack_id)?
            .or_not_found(msg::MINUTE_PACK_NOT_FOUND)?
    };

    // Reuse the Stripe customer across purchases; create one on first buy.
    let customer_id = match ctx.profile.stripe_customer_id.clone() {
        Some(id) => id,
        None => {
            let id = state
                .stripe
                .create_customer(&ctx.profile.email, &ctx.profile.id)
                .await?;
            let conn = state.db.get()?;
            queries::set_stripe_customer_id(&conn, &ctx.profile.id, &id)?;
            id
        }
    };

    let session = {
        let conn = state.db.get()?;
        queries::create_payment_session(
            &conn,
            &CreatePaymentSession {
                user_id: ctx.profile.id.clone(),
                minute_pack_id: pack.id.clone(),
                minutes: pack.minutes,
                price_cents: pack.price_cents,
            },
        )?
    };

    let success_url = format!("{}/purchase/success?session={}", state.app_url, session.id);
    let cancel_url = format!("{}/purchase/cancelled", state.app_url);

    let (provider_session_id, checkout_url) = state
        .stripe
        .create_checkout_session(
            &session.id,
            &customer_id,
            &ctx.profile.id,
            &pack.name,
            pack.minutes,
            pack.price_cents,
            &pack.currency,
            &success_url,
            &cancel_url,
        )
        .await?;

    {
        let conn = state.db.get()?;
        queries::set_payment_session_provider_id(&conn, &session.id, &provider_session_id)?;
    }

    tracing::info!(
        user_id = %ctx.profile.id,
        session_id = %session.id,
        pack = %pack.name,
        "checkout session created"
    );

    Ok(Json(CheckoutResponse {
        checkout_url,
        session_id: session.id,
    }))
}

pub fn router(state: AppState, limits: RateLimits) -> Router<AppState> {
    Router::new()
        .route("/checkout", post(create_checkout))
        .layer(rate_limit::strict_layer(limits.strict_rpm))
        .layer(middleware::from_fn_with_state(state, session_auth))
}
