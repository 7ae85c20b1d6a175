use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::db::{queries, AppState};
use crate::error::AppError;
use crate::models::Profile;

/// Authenticated request context, inserted as an extension for handlers
/// behind `session_auth`.
#[derive(Clone)]
pub struct AuthContext {
    pub profile: Profile,
}

/// Bearer-token session middleware.
///
/// Verifies the session JWT and loads the profile so handlers never see a
/// user id without a live row behind it (a deleted account invalidates its
/// outstanding tokens).
pub async fn session_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    let session = state.session_key.verify_session(token)?;

    let conn = state.db.get()?;
    let profile =
        queries::get_profile_by_id(&conn, &session.user_id)?.ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(AuthContext { profile });

    Ok(next.run(request).await)
}
