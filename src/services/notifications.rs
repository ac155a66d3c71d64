use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Notification, NotificationKind};

/// How many notifications one listing returns
const PAGE_SIZE: i64 = 50;

/// Records a notification for a user
pub async fn notify(
    pool: &PgPool,
    user_id: Uuid,
    kind: NotificationKind,
    message: &str,
) -> AppResult<Notification> {
    let notification: Notification = sqlx::query_as(
        r#"
        INSERT INTO notifications (id, user_id, kind, message, read, created_at)
        VALUES ($1, $2, $3, $4, FALSE, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(kind)
    .bind(message)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(notification)
}

/// Lists a user's notifications, newest first
pub async fn list(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<Notification>> {
    let notifications: Vec<Notification> = sqlx::query_as(
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(PAGE_SIZE)
    .fetch_all(pool)
    .await?;

    Ok(notifications)
}

/// Marks one notification as read
pub async fn mark_read(pool: &PgPool, user_id: Uuid, notification_id: Uuid) -> AppResult<()> {
    let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2")
        .bind(notification_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }

    Ok(())
}

/// Marks everything as read
pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> AppResult<u64> {
    let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND read = FALSE")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
