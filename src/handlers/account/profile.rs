use axum::extract::State;
use axum::Extension;

use crate::db::{queries, AppState};
use crate::error::{msg, OptionExt, Result};
use crate::extractors::Json;
use crate::middleware::AuthContext;
use crate::models::{Profile, UpdateProfile};

pub async fn get_account(Extension(ctx): Extension<AuthContext>) -> Result<Json<Profile>> {
    Ok(Json(ctx.profile))
}

pub async fn update_account(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<UpdateProfile>,
) -> Result<Json<Profile>> {
    request.validate()?;

    let conn = state.db.get()?;
    let profile = queries::update_profile(&conn, &ctx.profile.id, &request)?
        .or_not_found(msg::PROFILE_NOT_FOUND)?;

    Ok(Json(profile))
}
