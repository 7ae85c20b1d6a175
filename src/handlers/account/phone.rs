use axum::extract::State;
use axum::Extension;
use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, Result};
use crate::extractors::Json;
use crate::middleware::AuthContext;
use crate::models::{VERIFICATION_CODE_TTL_SECS, VERIFICATION_MAX_ATTEMPTS};

#[derive(Debug, Serialize)]
pub struct RequestCodeResponse {
    pub sent: bool,
    pub expires_in_secs: i64,
}

/// Send a 6-digit verification code to the phone number on file. Issuing a
/// new code invalidates any previous one.
pub async fn request_phone_code(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<RequestCodeResponse>> {
    let phone_number = ctx
        .profile
        .phone_number
        .clone()
        .ok_or_else(|| AppError::BadRequest(msg::PHONE_NUMBER_MISSING.into()))?;

    let code = crypto::generate_verification_code();
    let code_hash = crypto::hash_verification_code(&code);

    {
        let conn = state.db.get()?;
        queries::create_phone_verification(
            &conn,
            &ctx.profile.id,
            &phone_number,
            &code_hash,
            VERIFICATION_CODE_TTL_SECS,
        )?;
    }

    if state.dev_mode {
        // Dev mode skips the SMS so the flow works without provider creds.
        tracing::info!(user_id = %ctx.profile.id, code, "dev mode: verification code");
    } else {
        state
            .twilio
            .send_sms(
                &phone_number,
                &format!("Your Fancrush verification code is {}", code),
            )
            .await?;
    }

    Ok(Json(RequestCodeResponse {
        sent: true,
        expires_in_secs: VERIFICATION_CODE_TTL_SECS,
    }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyCodeResponse {
    pub phone_verified: bool,
}

pub async fn verify_phone_code(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>> {
    let conn = state.db.get()?;

    let verification = queries::get_active_phone_verification(&conn, &ctx.profile.id)?
        .ok_or_else(|| AppError::BadRequest(msg::VERIFICATION_CODE_INVALID.into()))?;

    if verification.attempts >= VERIFICATION_MAX_ATTEMPTS {
        return Err(AppError::BadRequest(
            msg::VERIFICATION_TOO_MANY_ATTEMPTS.into(),
        ));
    }

    let attempts = queries::record_verification_attempt(&conn, &verification.id)?;

    if !crypto::verify_code(&request.code, &verification.code_hash) {
        if attempts >= VERIFICATION_MAX_ATTEMPTS {
            queries::mark_verification_used(&conn, &verification.id)?;
        }
        return Err(AppError::BadRequest(msg::VERIFICATION_CODE_INVALID.into()));
    }

    queries::mark_verification_used(&conn, &verification.id)?;

    // Guarded on the phone number still matching: a number change between
    // code issue and verify must not verify the new number.
    if !queries::set_phone_verified(&conn, &ctx.profile.id, &verification.phone_number)? {
        return Err(AppError::BadRequest(msg::VERIFICATION_CODE_INVALID.into()));
    }

    tracing::info!(user_id = %ctx.profile.id, "phone number verified");

    Ok(Json(VerifyCodeResponse {
        phone_verified: true,
    }))
}
