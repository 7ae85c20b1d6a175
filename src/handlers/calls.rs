use axum::extract::State;
use axum::{middleware, routing::post, Extension, Router};
use serde::{Deserialize, Serialize};

use crate::config::RateLimits;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::Json;
use crate::ledger;
use crate::middleware::{session_auth, AuthContext};
use crate::models::CallStatus;
use crate::rate_limit;

#[derive(Debug, Deserialize)]
pub struct PstnCallRequest {
    pub influencer_id: String,
}

#[derive(Debug, Serialize)]
pub struct PstnCallResponse {
    pub call_id: String,
    pub provider_call_sid: String,
    pub status: CallStatus,
    pub minutes_reserved: i64,
}

/// Place a PSTN call to the caller's verified phone number.
///
/// Gating: the phone must be verified and the balance must cover one minute
/// at the influencer's rate. The reservation, the call log and its ledger
/// entry commit before the provider is contacted; if the provider refuses
/// the call the reservation is returned and the call marked failed.
pub async fn place_pstn_call(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<PstnCallRequest>,
) -> Result<Json<PstnCallResponse>> {
    if !ctx.profile.phone_verified {
        return Err(AppError::Forbidden(msg::PHONE_NOT_VERIFIED.into()));
    }
    let phone_number = ctx
        .profile
        .phone_number
        .clone()
        .ok_or_else(|| AppError::Forbidden(msg::PHONE_NOT_VERIFIED.into()))?;

    let (influencer, call) = {
        let mut conn = state.db.get()?;

        let influencer = queries::get_influencer_by_id(&conn, &request.influencer_id)?
            .or_not_found(msg::INFLUENCER_NOT_FOUND)?;
        if !influencer.is_callable() {
            return Err(AppError::BadRequest(msg::INFLUENCER_NOT_CALLABLE.into()));
        }

        let call = ledger::reserve_call_minutes(&mut conn, &ctx.profile.id, &influencer)?;
        (influencer, call)
    };

    // assistant_id presence is checked by is_callable
    let assistant_id = influencer.assistant_id.as_deref().unwrap_or_default();
    let voice_url = format!("{}/voice/{}", state.base_url, assistant_id);
    let status_callback = format!(
        "{}/webhooks/twilio/call-status?call_id={}",
        state.base_url, call.id
    );

    let placed = state
        .twilio
        .place_call(&phone_number, &voice_url, &status_callback)
        .await;

    let placed = match placed {
        Ok(placed) => placed,
        Err(e) => {
            tracing::warn!(call_id = %call.id, "provider refused call: {}", e);
            let mut conn = state.db.get()?;
            ledger::refund_call_reservation(&mut conn, &ctx.profile.id, &call)?;
            return Err(e);
        }
    };

    let status = placed.status.parse().unwrap_or(CallStatus::Initiated);
    {
        let conn = state.db.get()?;
        queries::set_call_provider_sid(&conn, &call.id, &placed.sid, status)?;
    }

    tracing::info!(
        call_id = %call.id,
        user_id = %ctx.profile.id,
        influencer = %influencer.slug,
        sid = %placed.sid,
        "PSTN call placed"
    );

    Ok(Json(PstnCallResponse {
        call_id: call.id,
        provider_call_sid: placed.sid,
        status,
        minutes_reserved: call.minutes_reserved,
    }))
}

pub fn router(state: AppState, limits: RateLimits) -> Router<AppState> {
    Router::new()
        .route("/calls/pstn", post(place_pstn_call))
        .layer(rate_limit::strict_layer(limits.strict_rpm))
        .layer(middleware::from_fn_with_state(state, session_auth))
}
