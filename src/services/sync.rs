use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::{Cache, CacheKey};
use crate::error::{AppError, AppResult};
use crate::models::{NotificationKind, RemoteEntry, RemotePush, User, WatchlistEntry};
use crate::services::providers::CatalogProvider;
use crate::services::{notifications, watchlist};

/// One reconciled entry, ready to be written locally
#[derive(Debug, Clone, PartialEq)]
pub struct MergedEntry {
    pub media_id: i32,
    pub title: String,
    pub status: crate::models::WatchStatus,
    pub progress: i32,
    pub score: Option<i16>,
    pub total_episodes: Option<i32>,
    pub genres: Vec<String>,
    pub cover_image: Option<String>,
}

impl MergedEntry {
    fn from_remote(remote: &RemoteEntry) -> Self {
        Self {
            media_id: remote.media_id,
            title: remote.title.clone(),
            status: remote.status,
            progress: remote.progress,
            score: remote.score,
            total_episodes: remote.total_episodes,
            genres: remote.genres.clone(),
            cover_image: remote.cover_image.clone(),
        }
    }

    fn to_entry(&self, user_id: Uuid) -> WatchlistEntry {
        WatchlistEntry {
            id: Uuid::new_v4(),
            user_id,
            media_id: self.media_id,
            title: self.title.clone(),
            status: self.status,
            progress: self.progress,
            total_episodes: self.total_episodes,
            score: self.score,
            genres: self.genres.clone(),
            cover_image: self.cover_image.clone(),
            updated_at: Utc::now(),
        }
    }
}

/// The operations a reconciliation run will apply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    /// Entries to create or overwrite locally
    pub local_upserts: Vec<MergedEntry>,
    /// Media ids to delete locally (present locally, absent remotely)
    pub local_deletes: Vec<i32>,
    /// Entries whose merged state differs from the remote copy
    pub remote_pushes: Vec<RemotePush>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.local_upserts.is_empty()
            && self.local_deletes.is_empty()
            && self.remote_pushes.is_empty()
    }
}

/// Outcome of a sync request, returned to the client
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncReport {
    pub debounced: bool,
    pub local_upserts: usize,
    pub local_deletes: usize,
    pub pushed: usize,
    pub push_failures: usize,
}

impl SyncReport {
    fn debounced() -> Self {
        Self {
            debounced: true,
            local_upserts: 0,
            local_deletes: 0,
            pushed: 0,
            push_failures: 0,
        }
    }
}

/// Tracks user ids with a sync currently in flight
///
/// A second request for the same user while one is running is rejected
/// instead of queued; the operation is cheap to retry.
#[derive(Clone, Default)]
pub struct SyncGuard {
    running: Arc<Mutex<HashSet<Uuid>>>,
}

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    async fn try_acquire(&self, user_id: Uuid) -> bool {
        self.running.lock().await.insert(user_id)
    }

    async fn release(&self, user_id: Uuid) {
        self.running.lock().await.remove(&user_id);
    }
}

/// Collapses duplicate local rows for the same anime, preferring the
/// higher-priority status and the larger progress.
fn dedupe_local(local: &[WatchlistEntry]) -> HashMap<i32, &WatchlistEntry> {
    let mut by_id: HashMap<i32, &WatchlistEntry> = HashMap::new();
    for entry in local {
        by_id
            .entry(entry.media_id)
            .and_modify(|kept| {
                if entry.status.priority() > kept.status.priority()
                    || (entry.status == kept.status && entry.progress > kept.progress)
                {
                    *kept = entry;
                }
            })
            .or_insert(entry);
    }
    by_id
}

/// Collapses duplicate remote entries the same way
fn dedupe_remote(remote: &[RemoteEntry]) -> HashMap<i32, &RemoteEntry> {
    let mut by_id: HashMap<i32, &RemoteEntry> = HashMap::new();
    for entry in remote {
        by_id
            .entry(entry.media_id)
            .and_modify(|kept| {
                if entry.status.priority() > kept.status.priority()
                    || (entry.status == kept.status && entry.progress > kept.progress)
                {
                    *kept = entry;
                }
            })
            .or_insert(entry);
    }
    by_id
}

/// Merges one anime tracked on both sides
///
/// Status conflicts resolve by priority, progress resolves to the larger
/// value, a local score survives over the remote one, and catalog metadata
/// follows the remote copy.
fn merge(local: &WatchlistEntry, remote: &RemoteEntry) -> MergedEntry {
    let status = if local.status.priority() >= remote.status.priority() {
        local.status
    } else {
        remote.status
    };

    let progress = watchlist::normalize_progress(
        status,
        local.progress.max(remote.progress),
        remote.total_episodes,
    );

    MergedEntry {
        media_id: remote.media_id,
        title: remote.title.clone(),
        status,
        progress,
        score: local.score.or(remote.score),
        total_episodes: remote.total_episodes,
        genres: remote.genres.clone(),
        cover_image: remote.cover_image.clone(),
    }
}

fn differs_from_local(merged: &MergedEntry, local: &WatchlistEntry) -> bool {
    merged.status != local.status
        || merged.progress != local.progress
        || merged.score != local.score
        || merged.title != local.title
        || merged.total_episodes != local.total_episodes
        || merged.genres != local.genres
        || merged.cover_image != local.cover_image
}

fn differs_from_remote(merged: &MergedEntry, remote: &RemoteEntry) -> bool {
    merged.status != remote.status
        || merged.progress != remote.progress
        || merged.score != remote.score
}

/// Builds the reconciliation plan for one user's local and remote lists.
///
/// Exactly one entry per media id survives the merge. Media present only
/// remotely are inserted locally; media present only locally are deleted
/// locally; merged entries that differ from the remote copy are pushed back.
/// Planning a converged state yields an empty plan.
pub fn plan(local: &[WatchlistEntry], remote: &[RemoteEntry]) -> SyncPlan {
    let local_by_id = dedupe_local(local);
    let remote_by_id = dedupe_remote(remote);

    let mut result = SyncPlan::default();

    for (media_id, remote_entry) in &remote_by_id {
        match local_by_id.get(media_id) {
            Some(local_entry) => {
                let merged = merge(local_entry, remote_entry);
                if differs_from_remote(&merged, remote_entry) {
                    result.remote_pushes.push(RemotePush {
                        media_id: merged.media_id,
                        status: merged.status,
                        progress: merged.progress,
                        score: merged.score,
                    });
                }
                if differs_from_local(&merged, local_entry) {
                    result.local_upserts.push(merged);
                }
            }
            None => result.local_upserts.push(MergedEntry::from_remote(remote_entry)),
        }
    }

    for media_id in local_by_id.keys() {
        if !remote_by_id.contains_key(media_id) {
            result.local_deletes.push(*media_id);
        }
    }

    // Deterministic order keeps logs and tests stable
    result.local_upserts.sort_by_key(|e| e.media_id);
    result.local_deletes.sort_unstable();
    result.remote_pushes.sort_by_key(|p| p.media_id);

    result
}

/// Runs one reconciliation for a linked account.
///
/// The run is debounced per user and guarded against concurrent executions.
/// Local writes and remote pushes are applied best-effort: a failing item is
/// logged and skipped, the rest of the run proceeds.
pub async fn run_sync(
    pool: &PgPool,
    cache: &Cache,
    catalog: &dyn CatalogProvider,
    guard: &SyncGuard,
    debounce_secs: u64,
    user: &User,
) -> AppResult<SyncReport> {
    let token = user.anilist_token.as_deref().ok_or_else(|| {
        AppError::InvalidInput("No AniList account linked".to_string())
    })?;
    let viewer_id = user.anilist_user_id.ok_or_else(|| {
        AppError::InvalidInput("No AniList account linked".to_string())
    })?;

    // Debounce window: a recent run makes this one a no-op
    let stamp: Option<i64> = match cache.get_from_cache(&CacheKey::SyncStamp(user.id)).await {
        Ok(stamp) => stamp,
        Err(e) => {
            tracing::warn!(error = %e, "Sync debounce check failed, proceeding");
            None
        }
    };
    if stamp.is_some() {
        tracing::debug!(user_id = %user.id, "Sync debounced");
        return Ok(SyncReport::debounced());
    }

    if !guard.try_acquire(user.id).await {
        return Err(AppError::Conflict(
            "A sync is already running for this account".to_string(),
        ));
    }

    let result = execute(pool, cache, catalog, debounce_secs, user, token, viewer_id).await;
    guard.release(user.id).await;
    result
}

async fn execute(
    pool: &PgPool,
    cache: &Cache,
    catalog: &dyn CatalogProvider,
    debounce_secs: u64,
    user: &User,
    token: &str,
    viewer_id: i32,
) -> AppResult<SyncReport> {
    let remote = catalog.remote_list(token, viewer_id).await?;
    let local = watchlist::list_entries(pool, user.id).await?;

    let sync_plan = plan(&local, &remote);

    tracing::info!(
        user_id = %user.id,
        local = local.len(),
        remote = remote.len(),
        upserts = sync_plan.local_upserts.len(),
        deletes = sync_plan.local_deletes.len(),
        pushes = sync_plan.remote_pushes.len(),
        "Sync plan built"
    );

    let mut report = SyncReport {
        debounced: false,
        local_upserts: 0,
        local_deletes: 0,
        pushed: 0,
        push_failures: 0,
    };

    for merged in &sync_plan.local_upserts {
        let entry = merged.to_entry(user.id);
        match watchlist::store_entry(pool, &entry).await {
            Ok(_) => report.local_upserts += 1,
            Err(e) => {
                tracing::error!(media_id = merged.media_id, error = %e, "Local upsert failed")
            }
        }
    }

    for media_id in &sync_plan.local_deletes {
        match watchlist::remove_entry(pool, user.id, *media_id).await {
            Ok(()) => report.local_deletes += 1,
            // Row already gone; the outcome is what the plan wanted
            Err(AppError::NotFound(_)) => report.local_deletes += 1,
            Err(e) => tracing::error!(media_id = media_id, error = %e, "Local delete failed"),
        }
    }

    for push in &sync_plan.remote_pushes {
        match catalog.push_entry(token, push).await {
            Ok(()) => report.pushed += 1,
            Err(e) => {
                tracing::warn!(media_id = push.media_id, error = %e, "Remote push failed");
                report.push_failures += 1;
            }
        }
    }

    // Stamp the debounce window; losing the write just allows an early re-run
    cache.set_in_background(
        &CacheKey::SyncStamp(user.id),
        &Utc::now().timestamp(),
        debounce_secs,
    );

    let message = format!(
        "Watchlist sync finished: {} updated, {} removed, {} pushed to AniList",
        report.local_upserts, report.local_deletes, report.pushed
    );
    if let Err(e) =
        notifications::notify(pool, user.id, NotificationKind::SyncCompleted, &message).await
    {
        tracing::warn!(error = %e, "Failed to record sync notification");
    }

    tracing::info!(
        user_id = %user.id,
        upserts = report.local_upserts,
        deletes = report.local_deletes,
        pushed = report.pushed,
        push_failures = report.push_failures,
        "Sync completed"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WatchStatus;

    fn local_entry(media_id: i32, status: WatchStatus, progress: i32) -> WatchlistEntry {
        WatchlistEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            media_id,
            title: format!("Anime {}", media_id),
            status,
            progress,
            total_episodes: Some(24),
            score: None,
            genres: vec!["Action".to_string()],
            cover_image: None,
            updated_at: Utc::now(),
        }
    }

    fn remote_entry(media_id: i32, status: WatchStatus, progress: i32) -> RemoteEntry {
        RemoteEntry {
            media_id,
            title: format!("Anime {}", media_id),
            status,
            progress,
            score: None,
            total_episodes: Some(24),
            genres: vec!["Action".to_string()],
            cover_image: None,
        }
    }

    #[test]
    fn test_plan_empty_inputs() {
        let result = plan(&[], &[]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_plan_identical_lists_is_empty() {
        let local = vec![local_entry(1, WatchStatus::Watching, 5)];
        let remote = vec![remote_entry(1, WatchStatus::Watching, 5)];
        assert!(plan(&local, &remote).is_empty());
    }

    #[test]
    fn test_remote_only_becomes_local_upsert() {
        let remote = vec![remote_entry(7, WatchStatus::PlanToWatch, 0)];
        let result = plan(&[], &remote);

        assert_eq!(result.local_upserts.len(), 1);
        assert_eq!(result.local_upserts[0].media_id, 7);
        assert!(result.local_deletes.is_empty());
        assert!(result.remote_pushes.is_empty());
    }

    #[test]
    fn test_local_only_becomes_delete() {
        let local = vec![local_entry(9, WatchStatus::Watching, 3)];
        let result = plan(&local, &[]);

        assert!(result.local_upserts.is_empty());
        assert_eq!(result.local_deletes, vec![9]);
        assert!(result.remote_pushes.is_empty());
    }

    #[test]
    fn test_remote_higher_status_wins_and_updates_local() {
        let local = vec![local_entry(1, WatchStatus::Watching, 24)];
        let remote = vec![remote_entry(1, WatchStatus::Completed, 24)];
        let result = plan(&local, &remote);

        assert_eq!(result.local_upserts.len(), 1);
        assert_eq!(result.local_upserts[0].status, WatchStatus::Completed);
        // Remote already holds the winning state, nothing to push
        assert!(result.remote_pushes.is_empty());
        assert!(result.local_deletes.is_empty());
    }

    #[test]
    fn test_local_higher_status_wins_and_pushes_remote() {
        let local = vec![local_entry(1, WatchStatus::Completed, 24)];
        let remote = vec![remote_entry(1, WatchStatus::Watching, 24)];
        let result = plan(&local, &remote);

        // Local already holds the winning state, nothing to upsert
        assert!(result.local_upserts.is_empty());
        assert_eq!(result.remote_pushes.len(), 1);
        assert_eq!(result.remote_pushes[0].status, WatchStatus::Completed);
        assert_eq!(result.remote_pushes[0].progress, 24);
    }

    #[test]
    fn test_progress_resolves_to_max() {
        let local = vec![local_entry(1, WatchStatus::Watching, 10)];
        let remote = vec![remote_entry(1, WatchStatus::Watching, 4)];
        let result = plan(&local, &remote);

        assert!(result.local_upserts.is_empty());
        assert_eq!(result.remote_pushes.len(), 1);
        assert_eq!(result.remote_pushes[0].progress, 10);

        let result = plan(
            &[local_entry(1, WatchStatus::Watching, 4)],
            &[remote_entry(1, WatchStatus::Watching, 10)],
        );
        assert_eq!(result.local_upserts.len(), 1);
        assert_eq!(result.local_upserts[0].progress, 10);
        assert!(result.remote_pushes.is_empty());
    }

    #[test]
    fn test_completed_merge_pins_progress_to_total() {
        let local = vec![local_entry(1, WatchStatus::Completed, 2)];
        let remote = vec![remote_entry(1, WatchStatus::Watching, 5)];
        let result = plan(&local, &remote);

        // Completed wins the status conflict, so progress pins to the episode count
        assert_eq!(result.local_upserts.len(), 1);
        assert_eq!(result.local_upserts[0].progress, 24);
        assert_eq!(result.remote_pushes.len(), 1);
        assert_eq!(result.remote_pushes[0].progress, 24);
    }

    #[test]
    fn test_local_score_survives_merge() {
        let mut local = local_entry(1, WatchStatus::Watching, 5);
        local.score = Some(8);
        let mut remote = remote_entry(1, WatchStatus::Watching, 5);
        remote.score = Some(6);

        let result = plan(&[local], &[remote]);

        // Local score wins and must reach the remote side
        assert!(result.local_upserts.is_empty());
        assert_eq!(result.remote_pushes.len(), 1);
        assert_eq!(result.remote_pushes[0].score, Some(8));
    }

    #[test]
    fn test_remote_score_fills_missing_local_score() {
        let local = local_entry(1, WatchStatus::Watching, 5);
        let mut remote = remote_entry(1, WatchStatus::Watching, 5);
        remote.score = Some(9);

        let result = plan(&[local], &[remote]);

        assert_eq!(result.local_upserts.len(), 1);
        assert_eq!(result.local_upserts[0].score, Some(9));
        assert!(result.remote_pushes.is_empty());
    }

    #[test]
    fn test_remote_metadata_refreshes_local() {
        let local = local_entry(1, WatchStatus::Watching, 5);
        let mut remote = remote_entry(1, WatchStatus::Watching, 5);
        remote.title = "Anime 1 (Remastered)".to_string();

        let result = plan(&[local], &[remote]);

        assert_eq!(result.local_upserts.len(), 1);
        assert_eq!(result.local_upserts[0].title, "Anime 1 (Remastered)");
        // Metadata changes never push back to the list API
        assert!(result.remote_pushes.is_empty());
    }

    #[test]
    fn test_duplicate_remote_ids_collapse_to_one() {
        let remote = vec![
            remote_entry(1, WatchStatus::PlanToWatch, 0),
            remote_entry(1, WatchStatus::Completed, 24),
            remote_entry(1, WatchStatus::Watching, 3),
        ];
        let result = plan(&[], &remote);

        assert_eq!(result.local_upserts.len(), 1);
        assert_eq!(result.local_upserts[0].status, WatchStatus::Completed);
    }

    #[test]
    fn test_one_entry_per_identifier() {
        let local = vec![
            local_entry(1, WatchStatus::Watching, 1),
            local_entry(2, WatchStatus::Dropped, 0),
            local_entry(3, WatchStatus::Completed, 24),
        ];
        let remote = vec![
            remote_entry(1, WatchStatus::Completed, 24),
            remote_entry(3, WatchStatus::Watching, 10),
            remote_entry(4, WatchStatus::PlanToWatch, 0),
        ];

        let result = plan(&local, &remote);

        let mut seen = HashSet::new();
        for upsert in &result.local_upserts {
            assert!(seen.insert(upsert.media_id), "duplicate upsert for one id");
        }
        // 2 exists only locally
        assert_eq!(result.local_deletes, vec![2]);
    }

    #[test]
    fn test_plan_is_idempotent_after_apply() {
        let local = vec![
            local_entry(1, WatchStatus::Watching, 10),
            local_entry(2, WatchStatus::Completed, 24),
            local_entry(5, WatchStatus::OnHold, 7),
        ];
        let mut scored = local_entry(6, WatchStatus::Watching, 2);
        scored.score = Some(7);
        let local = [local, vec![scored]].concat();

        let remote = vec![
            remote_entry(1, WatchStatus::Completed, 24),
            remote_entry(2, WatchStatus::Watching, 12),
            remote_entry(3, WatchStatus::PlanToWatch, 0),
            remote_entry(6, WatchStatus::Watching, 4),
        ];

        let first = plan(&local, &remote);
        assert!(!first.is_empty());

        // Apply the plan to both sides
        let mut new_local: Vec<WatchlistEntry> = local
            .iter()
            .filter(|e| !first.local_deletes.contains(&e.media_id))
            .filter(|e| {
                !first
                    .local_upserts
                    .iter()
                    .any(|u| u.media_id == e.media_id)
            })
            .cloned()
            .collect();
        for merged in &first.local_upserts {
            new_local.push(merged.to_entry(Uuid::nil()));
        }

        let new_remote: Vec<RemoteEntry> = remote
            .iter()
            .map(|r| {
                if let Some(push) = first
                    .remote_pushes
                    .iter()
                    .find(|p| p.media_id == r.media_id)
                {
                    RemoteEntry {
                        status: push.status,
                        progress: push.progress,
                        score: push.score,
                        ..r.clone()
                    }
                } else {
                    r.clone()
                }
            })
            .collect();

        let second = plan(&new_local, &new_remote);
        assert!(second.is_empty(), "re-plan was not empty: {:?}", second);
    }

    #[tokio::test]
    async fn test_sync_guard_blocks_second_acquire() {
        let guard = SyncGuard::new();
        let user_id = Uuid::new_v4();

        assert!(guard.try_acquire(user_id).await);
        assert!(!guard.try_acquire(user_id).await);

        guard.release(user_id).await;
        assert!(guard.try_acquire(user_id).await);
    }

    #[tokio::test]
    async fn test_sync_guard_is_per_user() {
        let guard = SyncGuard::new();
        assert!(guard.try_acquire(Uuid::new_v4()).await);
        assert!(guard.try_acquire(Uuid::new_v4()).await);
    }
}
