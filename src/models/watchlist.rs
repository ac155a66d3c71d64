use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tracking status for a watchlist entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "watch_status", rename_all = "snake_case")]
pub enum WatchStatus {
    Watching,
    Completed,
    OnHold,
    Dropped,
    PlanToWatch,
}

impl WatchStatus {
    /// Tie-break priority when two list sources disagree about the same anime.
    /// Higher wins.
    pub fn priority(self) -> u8 {
        match self {
            WatchStatus::Completed => 4,
            WatchStatus::Watching => 3,
            WatchStatus::OnHold => 2,
            WatchStatus::Dropped => 1,
            WatchStatus::PlanToWatch => 0,
        }
    }

    /// Maps an AniList media-list status string to the local status.
    ///
    /// REPEATING counts as watching. Unknown strings fall back to plan-to-watch.
    pub fn from_anilist(status: &str) -> Self {
        match status {
            "CURRENT" | "REPEATING" => WatchStatus::Watching,
            "COMPLETED" => WatchStatus::Completed,
            "PAUSED" => WatchStatus::OnHold,
            "DROPPED" => WatchStatus::Dropped,
            "PLANNING" => WatchStatus::PlanToWatch,
            _ => WatchStatus::PlanToWatch,
        }
    }

    /// Status value expected by the AniList SaveMediaListEntry mutation
    pub fn to_anilist(self) -> &'static str {
        match self {
            WatchStatus::Watching => "CURRENT",
            WatchStatus::Completed => "COMPLETED",
            WatchStatus::OnHold => "PAUSED",
            WatchStatus::Dropped => "DROPPED",
            WatchStatus::PlanToWatch => "PLANNING",
        }
    }
}

/// A user's tracked anime with status and progress
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct WatchlistEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    /// AniList media id
    pub media_id: i32,
    pub title: String,
    pub status: WatchStatus,
    /// Episodes watched
    pub progress: i32,
    pub total_episodes: Option<i32>,
    /// User score, 1-10
    pub score: Option<i16>,
    pub genres: Vec<String>,
    pub cover_image: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_priority_order() {
        assert!(WatchStatus::Completed.priority() > WatchStatus::Watching.priority());
        assert!(WatchStatus::Watching.priority() > WatchStatus::OnHold.priority());
        assert!(WatchStatus::OnHold.priority() > WatchStatus::Dropped.priority());
        assert!(WatchStatus::Dropped.priority() > WatchStatus::PlanToWatch.priority());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&WatchStatus::PlanToWatch).unwrap();
        assert_eq!(json, "\"plan_to_watch\"");

        let parsed: WatchStatus = serde_json::from_str("\"on_hold\"").unwrap();
        assert_eq!(parsed, WatchStatus::OnHold);
    }

    #[test]
    fn test_from_anilist_known_statuses() {
        assert_eq!(WatchStatus::from_anilist("CURRENT"), WatchStatus::Watching);
        assert_eq!(WatchStatus::from_anilist("REPEATING"), WatchStatus::Watching);
        assert_eq!(WatchStatus::from_anilist("COMPLETED"), WatchStatus::Completed);
        assert_eq!(WatchStatus::from_anilist("PAUSED"), WatchStatus::OnHold);
        assert_eq!(WatchStatus::from_anilist("DROPPED"), WatchStatus::Dropped);
        assert_eq!(WatchStatus::from_anilist("PLANNING"), WatchStatus::PlanToWatch);
    }

    #[test]
    fn test_from_anilist_unknown_status_falls_back() {
        assert_eq!(WatchStatus::from_anilist("WHATEVER"), WatchStatus::PlanToWatch);
        assert_eq!(WatchStatus::from_anilist(""), WatchStatus::PlanToWatch);
    }

    #[test]
    fn test_anilist_mapping_round_trip() {
        for status in [
            WatchStatus::Watching,
            WatchStatus::Completed,
            WatchStatus::OnHold,
            WatchStatus::Dropped,
            WatchStatus::PlanToWatch,
        ] {
            assert_eq!(WatchStatus::from_anilist(status.to_anilist()), status);
        }
    }
}
