use axum::extract::State;

use crate::db::{queries, AppState};
use crate::error::{msg, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::models::{Influencer, MinutePack};

pub async fn list_influencers(State(state): State<AppState>) -> Result<Json<Vec<Influencer>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_active_influencers(&conn)?))
}

pub async fn get_influencer(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Influencer>> {
    let conn = state.db.get()?;
    let influencer =
        queries::get_influencer_by_slug(&conn, &slug)?.or_not_found(msg::INFLUENCER_NOT_FOUND)?;
    Ok(Json(influencer))
}

pub async fn list_minute_packs(State(state): State<AppState>) -> Result<Json<Vec<MinutePack>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_active_minute_packs(&conn)?))
}
