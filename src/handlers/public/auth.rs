use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::auth::password;
use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::{CreateProfile, Profile};

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub profile: Profile,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<CreateProfile>,
) -> Result<Json<AuthResponse>> {
    request.validate()?;

    // Argon2 is deliberately slow; hash off the async runtime's hot path.
    let password_hash = {
        let password = request.password.clone();
        tokio::task::spawn_blocking(move || password::hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Hash task failed: {}", e)))??
    };

    let conn = state.db.get()?;
    let profile = queries::create_profile(&conn, &request, &password_hash)?;

    let token = state.session_key.sign_session(&profile.id, &profile.email)?;

    tracing::info!(user_id = %profile.id, "profile registered");

    Ok(Json(AuthResponse { token, profile }))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let (profile, stored_hash) = {
        let conn = state.db.get()?;
        let profile = queries::get_profile_by_email(&conn, &request.email)?
            .ok_or_else(|| AppError::Unauthorized)?;
        let stored_hash = queries::get_password_hash(&conn, &profile.id)?
            .ok_or_else(|| AppError::Unauthorized)?;
        (profile, stored_hash)
    };

    let verified = tokio::task::spawn_blocking(move || {
        password::verify_password(&request.password, &stored_hash)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Hash task failed: {}", e)))?;

    if !verified {
        return Err(AppError::Unauthorized);
    }

    let token = state.session_key.sign_session(&profile.id, &profile.email)?;

    Ok(Json(AuthResponse { token, profile }))
}
