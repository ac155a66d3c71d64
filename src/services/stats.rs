use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{GenreCount, WatchStats, WatchStatus, WatchlistEntry};
use crate::services::watchlist;

/// How many genres the breakdown reports at most
const GENRE_LIMIT: usize = 10;

/// Loads a user's entries and aggregates them
pub async fn user_stats(pool: &PgPool, user_id: Uuid) -> AppResult<WatchStats> {
    let entries = watchlist::list_entries(pool, user_id).await?;
    Ok(compute(&entries))
}

/// Aggregates watchlist entries into display statistics
pub fn compute(entries: &[WatchlistEntry]) -> WatchStats {
    let mut stats = WatchStats {
        total: entries.len(),
        watching: 0,
        completed: 0,
        on_hold: 0,
        dropped: 0,
        plan_to_watch: 0,
        episodes_watched: 0,
        mean_score: None,
        genres: Vec::new(),
    };

    let mut score_sum: i64 = 0;
    let mut score_count: i64 = 0;
    let mut genre_counts: HashMap<&str, usize> = HashMap::new();

    for entry in entries {
        match entry.status {
            WatchStatus::Watching => stats.watching += 1,
            WatchStatus::Completed => stats.completed += 1,
            WatchStatus::OnHold => stats.on_hold += 1,
            WatchStatus::Dropped => stats.dropped += 1,
            WatchStatus::PlanToWatch => stats.plan_to_watch += 1,
        }

        stats.episodes_watched += i64::from(entry.progress);

        if let Some(score) = entry.score {
            score_sum += i64::from(score);
            score_count += 1;
        }

        for genre in &entry.genres {
            *genre_counts.entry(genre.as_str()).or_insert(0) += 1;
        }
    }

    if score_count > 0 {
        stats.mean_score = Some(score_sum as f64 / score_count as f64);
    }

    let mut genres: Vec<GenreCount> = genre_counts
        .into_iter()
        .map(|(genre, count)| GenreCount {
            genre: genre.to_string(),
            count,
        })
        .collect();
    // Count first, then name, so the order is total
    genres.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.genre.cmp(&b.genre)));
    genres.truncate(GENRE_LIMIT);
    stats.genres = genres;

    stats
}
