use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Friend, FriendRequest, WatchlistEntry},
    routes::AppState,
    services::{auth, friends},
};

#[derive(Debug, Deserialize)]
pub struct SendRequestBody {
    pub username: String,
}

/// Handler listing the current user's friends
pub async fn list(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> AppResult<Json<Vec<Friend>>> {
    let friends = friends::list_friends(&state.pool, user_id).await?;
    Ok(Json(friends))
}

/// Handler listing incoming pending friend requests
pub async fn incoming(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> AppResult<Json<Vec<FriendRequest>>> {
    let requests = friends::incoming_requests(&state.pool, user_id).await?;
    Ok(Json(requests))
}

/// Handler sending a friend request by username
pub async fn send(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(request): Json<SendRequestBody>,
) -> AppResult<(StatusCode, Json<FriendRequest>)> {
    let sender = auth::find_user(&state.pool, user_id).await?;
    let created = friends::send_request(&state.pool, &sender, &request.username).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Handler accepting a pending friend request
pub async fn accept(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(request_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let user = auth::find_user(&state.pool, user_id).await?;
    friends::accept_request(&state.pool, &user, request_id).await?;
    Ok(StatusCode::OK)
}

/// Handler declining a pending friend request
pub async fn decline(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(request_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let user = auth::find_user(&state.pool, user_id).await?;
    friends::decline_request(&state.pool, &user, request_id).await?;
    Ok(StatusCode::OK)
}

/// Handler removing a friend
pub async fn remove(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(other): Path<Uuid>,
) -> AppResult<StatusCode> {
    friends::remove_friend(&state.pool, user_id, other).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler returning a friend's watchlist
pub async fn watchlist(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(friend_id): Path<Uuid>,
) -> AppResult<Json<Vec<WatchlistEntry>>> {
    let entries = friends::friend_watchlist(&state.pool, user_id, friend_id).await?;
    Ok(Json(entries))
}
