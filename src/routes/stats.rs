use axum::{extract::State, Extension, Json};

use crate::{
    error::AppResult, middleware::auth::AuthUser, models::WatchStats, routes::AppState,
    services::stats,
};

/// Handler for aggregate watchlist statistics
pub async fn stats(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> AppResult<Json<WatchStats>> {
    let stats = stats::user_stats(&state.pool, user_id).await?;
    Ok(Json(stats))
}
