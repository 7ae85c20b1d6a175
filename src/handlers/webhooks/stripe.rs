use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::ledger::{self, CreditOutcome};
use crate::payments::{StripeCheckoutSession, StripeWebhookEvent};

/// Stripe webhook endpoint.
///
/// Only `checkout.session.completed` drives state; everything else is
/// acknowledged and ignored. The raw body is needed for signature
/// verification, so parsing happens after the signature check.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing stripe-signature header".into()))?;

    if !state.stripe.verify_webhook_signature(&body, signature)? {
        tracing::warn!("Stripe webhook rejected: bad signature");
        return Ok((StatusCode::UNAUTHORIZED, Json(json!({"error": "Invalid signature"}))));
    }

    let event: StripeWebhookEvent = serde_json::from_slice(&body)?;

    if event.event_type != "checkout.session.completed" {
        tracing::debug!(event_type = %event.event_type, "Stripe event ignored");
        return Ok((StatusCode::OK, Json(json!({"received": true}))));
    }

    let checkout: StripeCheckoutSession = serde_json::from_value(event.data.object)?;

    // Async payment methods can complete a session unpaid; those fire a
    // later `async_payment_succeeded` retry with payment_status = paid.
    if checkout.payment_status != "paid" {
        tracing::info!(
            provider_session = %checkout.id,
            payment_status = %checkout.payment_status,
            "checkout completed but not paid yet"
        );
        return Ok((StatusCode::OK, Json(json!({"received": true}))));
    }

    let Some(session_id) = checkout.metadata.session_id.clone() else {
        tracing::warn!(provider_session = %checkout.id, "checkout missing session_id metadata");
        return Ok((StatusCode::OK, Json(json!({"received": true}))));
    };

    let mut conn = state.db.get()?;

    let Some(session) = queries::get_payment_session(&conn, &session_id)? else {
        tracing::warn!(session_id, "payment session not found for Stripe event");
        return Ok((StatusCode::OK, Json(json!({"received": true}))));
    };

    // Metadata user must match the session owner, otherwise the event was
    // constructed for a different session.
    if let Some(ref meta_user) = checkout.metadata.user_id {
        if *meta_user != session.user_id {
            tracing::warn!(
                session_id,
                "Stripe metadata user does not match payment session owner"
            );
            return Ok((StatusCode::OK, Json(json!({"received": true}))));
        }
    }

    let outcome = ledger::credit_purchase(
        &mut conn,
        &event.id,
        &session,
        checkout.payment_intent.as_deref(),
    )?;

    match outcome {
        CreditOutcome::AlreadyProcessed => {
            tracing::info!(event_id = %event.id, "duplicate Stripe event ignored");
        }
        CreditOutcome::SessionAlreadyCompleted => {
            tracing::info!(session_id, "payment session already credited");
        }
        CreditOutcome::Credited { minutes } => {
            tracing::info!(session_id, minutes, "purchase credited");
        }
    }

    Ok((StatusCode::OK, Json(json!({"received": true}))))
}
