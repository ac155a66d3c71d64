use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::friend::normalize_pair;
use crate::models::{Friend, FriendRequest, FriendRequestStatus, NotificationKind, User, WatchlistEntry};
use crate::services::{notifications, watchlist};

/// Sends a friend request to another user by username
pub async fn send_request(
    pool: &PgPool,
    sender: &User,
    to_username: &str,
) -> AppResult<FriendRequest> {
    let target: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(to_username.trim())
        .fetch_optional(pool)
        .await?;

    let target = target.ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if target.id == sender.id {
        return Err(AppError::InvalidInput(
            "You cannot befriend yourself".to_string(),
        ));
    }

    if are_friends(pool, sender.id, target.id).await? {
        return Err(AppError::Conflict("Already friends".to_string()));
    }

    let pending: Option<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM friend_requests
        WHERE status = 'pending'
          AND ((from_user = $1 AND to_user = $2) OR (from_user = $2 AND to_user = $1))
        "#,
    )
    .bind(sender.id)
    .bind(target.id)
    .fetch_optional(pool)
    .await?;

    if pending.is_some() {
        return Err(AppError::Conflict(
            "A friend request is already pending".to_string(),
        ));
    }

    let request: FriendRequest = sqlx::query_as(
        r#"
        INSERT INTO friend_requests (id, from_user, to_user, status, created_at)
        VALUES ($1, $2, $3, 'pending', $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(sender.id)
    .bind(target.id)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    tracing::info!(from = %sender.id, to = %target.id, "Friend request sent");

    let message = format!("{} sent you a friend request", sender.username);
    if let Err(e) =
        notifications::notify(pool, target.id, NotificationKind::FriendRequest, &message).await
    {
        tracing::warn!(error = %e, "Failed to record friend request notification");
    }

    Ok(request)
}

/// Lists pending requests addressed to the user
pub async fn incoming_requests(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<FriendRequest>> {
    let requests: Vec<FriendRequest> = sqlx::query_as(
        "SELECT * FROM friend_requests WHERE to_user = $1 AND status = 'pending' ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(requests)
}

/// Accepts a pending request addressed to the user and creates the friend edge
pub async fn accept_request(pool: &PgPool, user: &User, request_id: Uuid) -> AppResult<()> {
    let request = pending_request_for(pool, user.id, request_id).await?;

    sqlx::query("UPDATE friend_requests SET status = 'accepted' WHERE id = $1")
        .bind(request.id)
        .execute(pool)
        .await?;

    let (user_a, user_b) = normalize_pair(request.from_user, request.to_user);
    sqlx::query(
        r#"
        INSERT INTO friendships (user_a, user_b, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_a)
    .bind(user_b)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    tracing::info!(from = %request.from_user, to = %request.to_user, "Friend request accepted");

    let message = format!("{} accepted your friend request", user.username);
    if let Err(e) = notifications::notify(
        pool,
        request.from_user,
        NotificationKind::FriendAccepted,
        &message,
    )
    .await
    {
        tracing::warn!(error = %e, "Failed to record friend accepted notification");
    }

    Ok(())
}

/// Declines a pending request addressed to the user
pub async fn decline_request(pool: &PgPool, user: &User, request_id: Uuid) -> AppResult<()> {
    let request = pending_request_for(pool, user.id, request_id).await?;

    sqlx::query("UPDATE friend_requests SET status = 'declined' WHERE id = $1")
        .bind(request.id)
        .execute(pool)
        .await?;

    tracing::info!(from = %request.from_user, to = %request.to_user, "Friend request declined");

    Ok(())
}

async fn pending_request_for(
    pool: &PgPool,
    user_id: Uuid,
    request_id: Uuid,
) -> AppResult<FriendRequest> {
    let request: Option<FriendRequest> =
        sqlx::query_as("SELECT * FROM friend_requests WHERE id = $1")
            .bind(request_id)
            .fetch_optional(pool)
            .await?;

    let request =
        request.ok_or_else(|| AppError::NotFound("Friend request not found".to_string()))?;

    if request.to_user != user_id {
        return Err(AppError::Forbidden(
            "This request is not addressed to you".to_string(),
        ));
    }
    if request.status != FriendRequestStatus::Pending {
        return Err(AppError::Conflict(
            "This request was already resolved".to_string(),
        ));
    }

    Ok(request)
}

/// Lists accepted friends
pub async fn list_friends(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<Friend>> {
    let friends: Vec<Friend> = sqlx::query_as(
        r#"
        SELECT u.id, u.username, f.created_at AS since
        FROM friendships f
        JOIN users u ON u.id = CASE WHEN f.user_a = $1 THEN f.user_b ELSE f.user_a END
        WHERE f.user_a = $1 OR f.user_b = $1
        ORDER BY u.username
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(friends)
}

/// Whether a friend edge exists between two users
pub async fn are_friends(pool: &PgPool, a: Uuid, b: Uuid) -> AppResult<bool> {
    let (user_a, user_b) = normalize_pair(a, b);
    let row: Option<(Uuid,)> =
        sqlx::query_as("SELECT user_a FROM friendships WHERE user_a = $1 AND user_b = $2")
            .bind(user_a)
            .bind(user_b)
            .fetch_optional(pool)
            .await?;

    Ok(row.is_some())
}

/// Removes the friend edge between two users
pub async fn remove_friend(pool: &PgPool, user_id: Uuid, other: Uuid) -> AppResult<()> {
    let (user_a, user_b) = normalize_pair(user_id, other);
    let result = sqlx::query("DELETE FROM friendships WHERE user_a = $1 AND user_b = $2")
        .bind(user_a)
        .bind(user_b)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Friend not found".to_string()));
    }

    tracing::info!(user_id = %user_id, other = %other, "Friend removed");

    Ok(())
}

/// A friend's watchlist, readable only across an existing edge
pub async fn friend_watchlist(
    pool: &PgPool,
    user_id: Uuid,
    friend_id: Uuid,
) -> AppResult<Vec<WatchlistEntry>> {
    if !are_friends(pool, user_id, friend_id).await? {
        return Err(AppError::Forbidden(
            "You can only view watchlists of your friends".to_string(),
        ));
    }

    watchlist::list_entries(pool, friend_id).await
}
