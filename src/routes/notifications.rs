use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppResult, middleware::auth::AuthUser, models::Notification, routes::AppState,
    services::notifications,
};

/// Handler listing the current user's notifications
pub async fn list(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> AppResult<Json<Vec<Notification>>> {
    let notifications = notifications::list(&state.pool, user_id).await?;
    Ok(Json(notifications))
}

/// Handler marking one notification as read
pub async fn read(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(notification_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    notifications::mark_read(&state.pool, user_id, notification_id).await?;
    Ok(StatusCode::OK)
}

/// Handler marking every notification as read
pub async fn read_all(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    let updated = notifications::mark_all_read(&state.pool, user_id).await?;
    Ok(Json(json!({ "updated": updated })))
}
