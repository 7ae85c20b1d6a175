use axum::{
    body::Bytes,
    extract::{OriginalUri, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::Query;
use crate::ledger::{self, SettleOutcome};
use crate::models::CallStatus;

#[derive(Debug, Deserialize)]
pub struct CallStatusQuery {
    pub call_id: String,
}

/// Twilio call status callback.
///
/// The signature covers the exact callback URL (including the call_id query
/// parameter) plus the sorted form fields, so the body is taken raw and
/// decoded after validation. Terminal statuses settle billing exactly once;
/// progress statuses only update the call log.
pub async fn handle_call_status(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<CallStatusQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let params: Vec<(String, String)> = serde_urlencoded::from_bytes(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid form body: {}", e)))?;

    // Dev mode runs without provider credentials, so the signature cannot
    // be validated there.
    if !state.dev_mode {
        let signature = headers
            .get("x-twilio-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::BadRequest("Missing X-Twilio-Signature header".into()))?;

        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        let url = format!("{}{}", state.base_url, path_and_query);

        if !state.twilio.validate_signature(&url, &params, signature)? {
            tracing::warn!(call_id = %query.call_id, "Twilio callback rejected: bad signature");
            return Err(AppError::Unauthorized);
        }
    }

    let form_value = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };

    let status: CallStatus = form_value("CallStatus")
        .ok_or_else(|| AppError::BadRequest("Missing CallStatus".into()))?
        .parse()
        .map_err(|_| AppError::BadRequest("Unknown CallStatus".into()))?;

    let mut conn = state.db.get()?;

    if !status.is_terminal() {
        queries::update_call_status(&conn, &query.call_id, status)?;
        return Ok(StatusCode::OK);
    }

    let duration_seconds: i64 = form_value("CallDuration")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    match ledger::settle_call(&mut conn, &query.call_id, status, duration_seconds)? {
        SettleOutcome::UnknownCall => {
            // Retrying cannot fix an unknown call id, so acknowledge it.
            tracing::warn!(call_id = %query.call_id, "terminal callback for unknown call");
        }
        SettleOutcome::AlreadySettled => {
            tracing::info!(call_id = %query.call_id, "duplicate terminal callback ignored");
        }
        SettleOutcome::Settled { .. } => {}
    }

    Ok(StatusCode::OK)
}
