use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::{
    error::AppResult,
    middleware::auth::AuthUser,
    middleware::request_id::RequestId,
    models::{WatchStatus, WatchlistEntry},
    routes::AppState,
    services::auth,
    services::sync::{run_sync, SyncReport},
    services::watchlist::{self, EntryUpdate},
};

#[derive(Debug, Deserialize)]
pub struct UpsertEntryRequest {
    pub status: WatchStatus,
    #[serde(default)]
    pub progress: i32,
    pub score: Option<i16>,
}

/// Handler listing the current user's watchlist
pub async fn list(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> AppResult<Json<Vec<WatchlistEntry>>> {
    let entries = watchlist::list_entries(&state.pool, user_id).await?;
    Ok(Json(entries))
}

/// Handler creating or overwriting one entry
pub async fn upsert(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(media_id): Path<i32>,
    Json(request): Json<UpsertEntryRequest>,
) -> AppResult<Json<WatchlistEntry>> {
    let entry = watchlist::upsert_entry(
        &state.pool,
        state.catalog.as_ref(),
        user_id,
        media_id,
        EntryUpdate {
            status: request.status,
            progress: request.progress,
            score: request.score,
        },
    )
    .await?;

    Ok(Json(entry))
}

/// Handler removing one entry
pub async fn remove(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(media_id): Path<i32>,
) -> AppResult<StatusCode> {
    watchlist::remove_entry(&state.pool, user_id, media_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for watchlist reconciliation against the linked AniList account
pub async fn sync(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<SyncReport>> {
    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        "Processing sync request"
    );

    let user = auth::find_user(&state.pool, user_id).await?;

    let report = run_sync(
        &state.pool,
        &state.cache,
        state.catalog.as_ref(),
        &state.sync_guard,
        state.config.sync_debounce_secs,
        &user,
    )
    .await?;

    tracing::info!(
        request_id = %request_id,
        debounced = report.debounced,
        "Sync request completed"
    );

    Ok(Json(report))
}
