use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{WatchStatus, WatchlistEntry};
use crate::services::providers::CatalogProvider;

/// Client-supplied fields of a watchlist entry; everything else comes from the catalog
#[derive(Debug, Clone, Copy)]
pub struct EntryUpdate {
    pub status: WatchStatus,
    pub progress: i32,
    pub score: Option<i16>,
}

/// Lists a user's entries, most recently touched first
pub async fn list_entries(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<WatchlistEntry>> {
    let entries: Vec<WatchlistEntry> = sqlx::query_as(
        "SELECT * FROM watchlist_entries WHERE user_id = $1 ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Creates or overwrites the entry for one anime
///
/// Catalog metadata (title, episode count, genres, cover) is resolved through
/// the provider so clients only send tracking fields.
pub async fn upsert_entry(
    pool: &PgPool,
    catalog: &dyn CatalogProvider,
    user_id: Uuid,
    media_id: i32,
    update: EntryUpdate,
) -> AppResult<WatchlistEntry> {
    if update.progress < 0 {
        return Err(AppError::InvalidInput(
            "Progress cannot be negative".to_string(),
        ));
    }
    if let Some(score) = update.score {
        if !(1..=10).contains(&score) {
            return Err(AppError::InvalidInput(
                "Score must be between 1 and 10".to_string(),
            ));
        }
    }

    let anime = catalog.detail(media_id).await?;
    let progress = normalize_progress(update.status, update.progress, anime.episodes);

    let entry = WatchlistEntry {
        id: Uuid::new_v4(),
        user_id,
        media_id,
        title: anime.title,
        status: update.status,
        progress,
        total_episodes: anime.episodes,
        score: update.score,
        genres: anime.genres,
        cover_image: anime.cover_image,
        updated_at: Utc::now(),
    };

    let stored = store_entry(pool, &entry).await?;

    tracing::info!(
        user_id = %user_id,
        media_id = media_id,
        status = ?stored.status,
        "Watchlist entry upserted"
    );

    Ok(stored)
}

/// Writes an entry, overwriting any existing row for the same (user, anime)
///
/// The returned row keeps the id of a pre-existing entry.
pub async fn store_entry(pool: &PgPool, entry: &WatchlistEntry) -> AppResult<WatchlistEntry> {
    let stored: WatchlistEntry = sqlx::query_as(
        r#"
        INSERT INTO watchlist_entries
            (id, user_id, media_id, title, status, progress, total_episodes, score, genres, cover_image, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (user_id, media_id) DO UPDATE SET
            title = EXCLUDED.title,
            status = EXCLUDED.status,
            progress = EXCLUDED.progress,
            total_episodes = EXCLUDED.total_episodes,
            score = EXCLUDED.score,
            genres = EXCLUDED.genres,
            cover_image = EXCLUDED.cover_image,
            updated_at = EXCLUDED.updated_at
        RETURNING *
        "#,
    )
    .bind(entry.id)
    .bind(entry.user_id)
    .bind(entry.media_id)
    .bind(&entry.title)
    .bind(entry.status)
    .bind(entry.progress)
    .bind(entry.total_episodes)
    .bind(entry.score)
    .bind(&entry.genres)
    .bind(&entry.cover_image)
    .bind(entry.updated_at)
    .fetch_one(pool)
    .await?;

    Ok(stored)
}

/// Removes one entry
pub async fn remove_entry(pool: &PgPool, user_id: Uuid, media_id: i32) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM watchlist_entries WHERE user_id = $1 AND media_id = $2")
        .bind(user_id)
        .bind(media_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Watchlist entry not found".to_string(),
        ));
    }

    tracing::info!(user_id = %user_id, media_id = media_id, "Watchlist entry removed");

    Ok(())
}

/// Keeps progress inside the known episode count and pins completed shows
/// to their final episode.
pub fn normalize_progress(status: WatchStatus, progress: i32, total_episodes: Option<i32>) -> i32 {
    match (status, total_episodes) {
        (WatchStatus::Completed, Some(total)) => total,
        (_, Some(total)) => progress.min(total),
        (_, None) => progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_progress_clamps_to_total() {
        assert_eq!(
            normalize_progress(WatchStatus::Watching, 30, Some(24)),
            24
        );
        assert_eq!(normalize_progress(WatchStatus::Watching, 5, Some(24)), 5);
    }

    #[test]
    fn test_normalize_progress_completed_pins_to_total() {
        assert_eq!(
            normalize_progress(WatchStatus::Completed, 0, Some(64)),
            64
        );
    }

    #[test]
    fn test_normalize_progress_unknown_total_passes_through() {
        assert_eq!(normalize_progress(WatchStatus::Watching, 120, None), 120);
        assert_eq!(normalize_progress(WatchStatus::Completed, 12, None), 12);
    }
}
