use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use crate::{
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Profile, RemoteViewer},
    routes::AppState,
    services::auth,
};

#[derive(Debug, Deserialize)]
pub struct LinkAniListRequest {
    pub token: String,
}

/// Handler returning the current user's profile
pub async fn profile(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> AppResult<Json<Profile>> {
    let user = auth::find_user(&state.pool, user_id).await?;
    Ok(Json(Profile::from(&user)))
}

/// Handler linking an AniList account to the current user
pub async fn link_anilist(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(request): Json<LinkAniListRequest>,
) -> AppResult<Json<RemoteViewer>> {
    let viewer = auth::link_anilist(
        &state.pool,
        state.catalog.as_ref(),
        user_id,
        &request.token,
    )
    .await?;

    Ok(Json(viewer))
}

/// Handler removing the AniList link
pub async fn unlink_anilist(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> AppResult<Json<Profile>> {
    auth::unlink_anilist(&state.pool, user_id).await?;
    let user = auth::find_user(&state.pool, user_id).await?;
    Ok(Json(Profile::from(&user)))
}
