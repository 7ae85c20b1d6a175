use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::Json;
use crate::models::{CallLog, DEMO_CALL_CAP_SECONDS};

#[derive(Debug, Deserialize)]
pub struct DemoCallRequest {
    pub influencer_slug: String,
    pub duration_seconds: i64,
}

/// Record a browser demo call. Demo calls are free, capped and never touch
/// the minute balance; the log only drives usage reporting.
///
/// The endpoint is public (demos run before signup). A valid session token,
/// if supplied, attributes the call to the account; an invalid one is
/// treated as anonymous rather than rejected.
pub async fn log_demo_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DemoCallRequest>,
) -> Result<Json<CallLog>> {
    if request.duration_seconds < 0 {
        return Err(AppError::BadRequest("Duration cannot be negative".into()));
    }
    let duration = request.duration_seconds.min(DEMO_CALL_CAP_SECONDS);

    let user_id = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| state.session_key.verify_session(token).ok())
        .map(|session| session.user_id);

    let conn = state.db.get()?;
    let influencer = queries::get_influencer_by_slug(&conn, &request.influencer_slug)?
        .or_not_found(msg::INFLUENCER_NOT_FOUND)?;

    let call = queries::create_demo_call_log(&conn, user_id.as_deref(), &influencer.id, duration)?;

    Ok(Json(call))
}
