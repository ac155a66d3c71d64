use axum::{extract::State, Extension, Json};

use crate::{
    error::AppResult,
    middleware::auth::AuthUser,
    routes::AppState,
    services::recommendations::{self, Recommendation},
};

/// Handler for AI-generated recommendations
pub async fn recommend(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let recommendations = recommendations::recommendations_for(
        &state.pool,
        &state.cache,
        state.model.as_ref(),
        user_id,
    )
    .await?;

    Ok(Json(recommendations))
}
