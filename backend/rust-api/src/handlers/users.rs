use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::middlewares::auth::JwtClaims;
use crate::services::AppState;

use super::error::ApiError;

/// Public profile. `own_profile` is set when the bearer token belongs to the
/// profile owner.
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.as_ref().map(|Extension(claims)| claims.sub.as_str());
    let profile = state.games.player_profile(&user_id, viewer).await?;
    Ok(Json(profile))
}

pub async fn list_games(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let games = state.games.list_games(&user_id).await?;
    Ok(Json(games))
}
