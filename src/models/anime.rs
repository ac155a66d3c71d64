use serde::{Deserialize, Serialize};

use super::WatchStatus;

/// A catalog anime returned to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Anime {
    /// AniList media id
    pub media_id: i32,
    pub title: String,
    pub episodes: Option<i32>,
    /// Airing status as reported by the catalog (FINISHED, RELEASING, ...)
    pub airing_status: Option<String>,
    pub genres: Vec<String>,
    pub cover_image: Option<String>,
    pub description: Option<String>,
    /// Community score, 0-100
    pub average_score: Option<i32>,
    pub season_year: Option<i32>,
}

/// The account behind an AniList access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteViewer {
    pub id: i32,
    pub name: String,
}

/// One entry of the remote AniList list, flattened for reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntry {
    pub media_id: i32,
    pub title: String,
    pub status: WatchStatus,
    pub progress: i32,
    pub score: Option<i16>,
    pub total_episodes: Option<i32>,
    pub genres: Vec<String>,
    pub cover_image: Option<String>,
}

/// Fields pushed back to AniList through the list mutation
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePush {
    pub media_id: i32,
    pub status: WatchStatus,
    pub progress: i32,
    pub score: Option<i16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anime_serde_round_trip() {
        let anime = Anime {
            media_id: 5114,
            title: "Fullmetal Alchemist: Brotherhood".to_string(),
            episodes: Some(64),
            airing_status: Some("FINISHED".to_string()),
            genres: vec!["Action".to_string(), "Adventure".to_string()],
            cover_image: Some("https://img.anili.st/5114.jpg".to_string()),
            description: None,
            average_score: Some(90),
            season_year: Some(2009),
        };

        let json = serde_json::to_string(&anime).unwrap();
        let parsed: Anime = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, anime);
    }
}
