/// AniList GraphQL provider
///
/// Implements the CatalogProvider trait against the public AniList API.
/// Search and detail responses are cached in Redis; account-scoped calls
/// (viewer, list, mutations) always go to the network. AniList enforces a
/// request budget per client, so all calls pass through a shared limiter.
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{Anime, RemoteEntry, RemotePush, RemoteViewer, WatchStatus},
    services::providers::CatalogProvider,
};
use reqwest::{header, Client as HttpClient};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const SEARCH_CACHE_TTL: u64 = 3600; // 1 hour
const DETAIL_CACHE_TTL: u64 = 86400; // 1 day
const SEARCH_PAGE_SIZE: i32 = 10;
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(1000);

const MEDIA_FIELDS: &str = r#"
    id
    title {
        romaji
        english
        native
    }
    episodes
    status
    genres
    coverImage {
        large
    }
    description
    averageScore
    seasonYear
"#;

/// GraphQL response wrapper
#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(rename = "Page")]
    page: PageData,
}

#[derive(Debug, Deserialize)]
struct PageData {
    media: Vec<MediaData>,
}

#[derive(Debug, Deserialize)]
struct DetailData {
    #[serde(rename = "Media")]
    media: MediaData,
}

#[derive(Debug, Deserialize)]
struct ViewerData {
    #[serde(rename = "Viewer")]
    viewer: ViewerNode,
}

#[derive(Debug, Deserialize)]
struct ViewerNode {
    id: i32,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(rename = "MediaListCollection")]
    collection: ListCollection,
}

#[derive(Debug, Deserialize)]
struct ListCollection {
    lists: Vec<ListGroup>,
}

#[derive(Debug, Deserialize)]
struct ListGroup {
    entries: Vec<ListEntryData>,
}

#[derive(Debug, Deserialize)]
struct ListEntryData {
    status: String,
    progress: Option<i32>,
    /// POINT_10 format; 0.0 means unscored
    score: Option<f64>,
    media: MediaData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaData {
    id: i32,
    title: TitleData,
    episodes: Option<i32>,
    status: Option<String>,
    #[serde(default)]
    genres: Vec<String>,
    cover_image: Option<CoverImageData>,
    description: Option<String>,
    average_score: Option<i32>,
    season_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct TitleData {
    romaji: Option<String>,
    english: Option<String>,
    native: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoverImageData {
    large: Option<String>,
}

/// Client-side request spacing
struct RateLimiter {
    next_allowed: Instant,
}

impl RateLimiter {
    fn new() -> Self {
        Self {
            next_allowed: Instant::now(),
        }
    }
}

#[derive(Clone)]
pub struct AniListProvider {
    http_client: HttpClient,
    api_url: String,
    cache: Cache,
    limiter: Arc<Mutex<RateLimiter>>,
}

impl AniListProvider {
    pub fn new(cache: Cache, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url,
            cache,
            limiter: Arc::new(Mutex::new(RateLimiter::new())),
        }
    }

    /// Waits until the next request slot is free.
    ///
    /// The lock is held across the sleep so concurrent callers queue up behind
    /// each other rather than racing for the same slot.
    async fn throttle(&self) {
        let mut limiter = self.limiter.lock().await;
        let now = Instant::now();
        if limiter.next_allowed > now {
            tokio::time::sleep_until(limiter.next_allowed).await;
        }
        limiter.next_allowed = Instant::now() + MIN_REQUEST_INTERVAL;
    }

    /// Execute a GraphQL query against the AniList endpoint
    async fn execute_query<T>(
        &self,
        token: Option<&str>,
        query: &str,
        variables: serde_json::Value,
    ) -> AppResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.throttle().await;

        let body = json!({
            "query": query,
            "variables": variables
        });

        let mut request = self
            .http_client
            .post(&self.api_url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json");

        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "AniList returned status {}: {}",
                status, body
            )));
        }

        let graphql_response: GraphQlResponse<T> = response.json().await?;

        if let Some(errors) = graphql_response.errors {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(AppError::ExternalApi(format!(
                "AniList errors: {}",
                messages.join(", ")
            )));
        }

        graphql_response
            .data
            .ok_or_else(|| AppError::ExternalApi("AniList returned no data".to_string()))
    }
}

/// Display title preference: english, then romaji, then native
fn display_title(title: &TitleData, media_id: i32) -> String {
    title
        .english
        .clone()
        .or_else(|| title.romaji.clone())
        .or_else(|| title.native.clone())
        .unwrap_or_else(|| format!("Anime #{}", media_id))
}

fn map_media(media: MediaData) -> Anime {
    let title = display_title(&media.title, media.id);
    Anime {
        media_id: media.id,
        title,
        episodes: media.episodes,
        airing_status: media.status,
        genres: media.genres,
        cover_image: media.cover_image.and_then(|c| c.large),
        description: media.description,
        average_score: media.average_score,
        season_year: media.season_year,
    }
}

fn map_list_entry(entry: ListEntryData) -> RemoteEntry {
    let media = entry.media;
    let title = display_title(&media.title, media.id);
    RemoteEntry {
        media_id: media.id,
        title,
        status: WatchStatus::from_anilist(&entry.status),
        progress: entry.progress.unwrap_or(0),
        // AniList reports 0.0 for unscored entries
        score: entry
            .score
            .filter(|s| *s > 0.0)
            .map(|s| s.round() as i16),
        total_episodes: media.episodes,
        genres: media.genres,
        cover_image: media.cover_image.and_then(|c| c.large),
    }
}

#[async_trait::async_trait]
impl CatalogProvider for AniListProvider {
    async fn search(&self, query: &str) -> AppResult<Vec<Anime>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        cached!(
            self.cache,
            CacheKey::AnimeSearch(query.to_string()),
            SEARCH_CACHE_TTL,
            async move {
                let graphql_query = format!(
                    r#"
                    query ($search: String, $perPage: Int) {{
                        Page(page: 1, perPage: $perPage) {{
                            media(search: $search, type: ANIME) {{
                                {MEDIA_FIELDS}
                            }}
                        }}
                    }}
                    "#
                );

                let variables = json!({
                    "search": query,
                    "perPage": SEARCH_PAGE_SIZE
                });

                let data: SearchData = self
                    .execute_query(None, &graphql_query, variables)
                    .await?;
                let results: Vec<Anime> = data.page.media.into_iter().map(map_media).collect();

                tracing::info!(
                    query = %query,
                    results = results.len(),
                    provider = "anilist",
                    "Catalog search completed"
                );

                Ok::<Vec<Anime>, AppError>(results)
            }
        )
    }

    async fn detail(&self, media_id: i32) -> AppResult<Anime> {
        cached!(
            self.cache,
            CacheKey::AnimeDetail(media_id),
            DETAIL_CACHE_TTL,
            async move {
                let graphql_query = format!(
                    r#"
                    query ($id: Int) {{
                        Media(id: $id, type: ANIME) {{
                            {MEDIA_FIELDS}
                        }}
                    }}
                    "#
                );

                let variables = json!({ "id": media_id });

                let data: DetailData = self
                    .execute_query(None, &graphql_query, variables)
                    .await?;

                tracing::info!(
                    media_id = media_id,
                    provider = "anilist",
                    "Catalog detail fetched"
                );

                Ok::<Anime, AppError>(map_media(data.media))
            }
        )
    }

    async fn viewer(&self, token: &str) -> AppResult<RemoteViewer> {
        let graphql_query = r#"
            query {
                Viewer {
                    id
                    name
                }
            }
        "#;

        let data: ViewerData = self
            .execute_query(Some(token), graphql_query, json!({}))
            .await?;

        Ok(RemoteViewer {
            id: data.viewer.id,
            name: data.viewer.name,
        })
    }

    async fn remote_list(&self, token: &str, viewer_id: i32) -> AppResult<Vec<RemoteEntry>> {
        let graphql_query = format!(
            r#"
            query ($userId: Int) {{
                MediaListCollection(userId: $userId, type: ANIME) {{
                    lists {{
                        entries {{
                            status
                            progress
                            score(format: POINT_10)
                            media {{
                                {MEDIA_FIELDS}
                            }}
                        }}
                    }}
                }}
            }}
            "#
        );

        let variables = json!({ "userId": viewer_id });

        let data: ListData = self
            .execute_query(Some(token), &graphql_query, variables)
            .await?;

        // AniList splits the collection into one group per status
        let entries: Vec<RemoteEntry> = data
            .collection
            .lists
            .into_iter()
            .flat_map(|group| group.entries)
            .map(map_list_entry)
            .collect();

        tracing::info!(
            viewer_id = viewer_id,
            entries = entries.len(),
            provider = "anilist",
            "Remote list fetched"
        );

        Ok(entries)
    }

    async fn push_entry(&self, token: &str, push: &RemotePush) -> AppResult<()> {
        let graphql_query = r#"
            mutation ($mediaId: Int, $status: MediaListStatus, $progress: Int, $score: Float) {
                SaveMediaListEntry(mediaId: $mediaId, status: $status, progress: $progress, score: $score) {
                    id
                }
            }
        "#;

        let variables = json!({
            "mediaId": push.media_id,
            "status": push.status.to_anilist(),
            "progress": push.progress,
            "score": push.score.map(f64::from)
        });

        let _: serde_json::Value = self
            .execute_query(Some(token), graphql_query, variables)
            .await?;

        tracing::debug!(
            media_id = push.media_id,
            provider = "anilist",
            "Remote entry pushed"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "anilist"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(english: Option<&str>, romaji: Option<&str>, native: Option<&str>) -> MediaData {
        MediaData {
            id: 1535,
            title: TitleData {
                romaji: romaji.map(str::to_string),
                english: english.map(str::to_string),
                native: native.map(str::to_string),
            },
            episodes: Some(37),
            status: Some("FINISHED".to_string()),
            genres: vec!["Thriller".to_string()],
            cover_image: Some(CoverImageData {
                large: Some("https://img.anili.st/1535.jpg".to_string()),
            }),
            description: Some("A shinigami drops a notebook.".to_string()),
            average_score: Some(84),
            season_year: Some(2006),
        }
    }

    #[test]
    fn test_display_title_prefers_english() {
        let anime = map_media(media(Some("Death Note"), Some("Desu Noto"), None));
        assert_eq!(anime.title, "Death Note");
    }

    #[test]
    fn test_display_title_falls_back_to_romaji_then_native() {
        let anime = map_media(media(None, Some("Desu Noto"), Some("デスノート")));
        assert_eq!(anime.title, "Desu Noto");

        let anime = map_media(media(None, None, Some("デスノート")));
        assert_eq!(anime.title, "デスノート");
    }

    #[test]
    fn test_display_title_placeholder_when_untitled() {
        let anime = map_media(media(None, None, None));
        assert_eq!(anime.title, "Anime #1535");
    }

    #[test]
    fn test_map_media_fields() {
        let anime = map_media(media(Some("Death Note"), None, None));
        assert_eq!(anime.media_id, 1535);
        assert_eq!(anime.episodes, Some(37));
        assert_eq!(anime.airing_status, Some("FINISHED".to_string()));
        assert_eq!(anime.genres, vec!["Thriller".to_string()]);
        assert_eq!(
            anime.cover_image,
            Some("https://img.anili.st/1535.jpg".to_string())
        );
        assert_eq!(anime.average_score, Some(84));
        assert_eq!(anime.season_year, Some(2006));
    }

    #[test]
    fn test_map_list_entry_converts_status_and_score() {
        let entry = ListEntryData {
            status: "PAUSED".to_string(),
            progress: Some(12),
            score: Some(7.6),
            media: media(Some("Death Note"), None, None),
        };

        let remote = map_list_entry(entry);
        assert_eq!(remote.media_id, 1535);
        assert_eq!(remote.status, WatchStatus::OnHold);
        assert_eq!(remote.progress, 12);
        assert_eq!(remote.score, Some(8));
        assert_eq!(remote.total_episodes, Some(37));
    }

    #[test]
    fn test_map_list_entry_zero_score_means_unscored() {
        let entry = ListEntryData {
            status: "CURRENT".to_string(),
            progress: None,
            score: Some(0.0),
            media: media(Some("Death Note"), None, None),
        };

        let remote = map_list_entry(entry);
        assert_eq!(remote.status, WatchStatus::Watching);
        assert_eq!(remote.progress, 0);
        assert_eq!(remote.score, None);
    }

    #[test]
    fn test_parse_search_response() {
        let payload = r#"
        {
            "data": {
                "Page": {
                    "media": [
                        {
                            "id": 21,
                            "title": {"romaji": "One Piece", "english": "One Piece", "native": null},
                            "episodes": null,
                            "status": "RELEASING",
                            "genres": ["Action", "Adventure"],
                            "coverImage": {"large": "https://img.anili.st/21.jpg"},
                            "description": null,
                            "averageScore": 88,
                            "seasonYear": 1999
                        }
                    ]
                }
            }
        }
        "#;

        let parsed: GraphQlResponse<SearchData> = serde_json::from_str(payload).unwrap();
        let data = parsed.data.unwrap();
        assert_eq!(data.page.media.len(), 1);
        assert_eq!(data.page.media[0].id, 21);
        assert!(parsed.errors.is_none());
    }

    #[test]
    fn test_parse_graphql_error_response() {
        let payload = r#"
        {
            "data": null,
            "errors": [{"message": "Invalid token", "status": 401}]
        }
        "#;

        let parsed: GraphQlResponse<SearchData> = serde_json::from_str(payload).unwrap();
        assert!(parsed.data.is_none());
        let errors = parsed.errors.unwrap();
        assert_eq!(errors[0].message, "Invalid token");
    }
}
