use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{WatchStatus, WatchlistEntry},
    services::{llm::LanguageModel, stats, watchlist},
};

const RECS_CACHE_TTL: u64 = 3600; // 1 hour
const MAX_PROMPT_TITLES: usize = 40;

const SYSTEM_PROMPT: &str = "You are an anime recommendation engine. \
Given a viewer's watch history, suggest up to 10 anime they have not seen. \
Respond with JSON only, in the shape \
{\"recommendations\": [{\"title\": string, \"media_id\": number or null, \"reason\": string}]}. \
media_id is the AniList id when you know it. Keep each reason to one sentence.";

/// One AI-generated suggestion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub title: String,
    /// AniList media id when the model knows it
    pub media_id: Option<i32>,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct RecommendationEnvelope {
    recommendations: Vec<Recommendation>,
}

/// Generates personalized recommendations from the user's watchlist
///
/// Builds a taste prompt out of the user's entries, asks the chat model for a
/// constrained JSON array, and caches the parsed result per user.
pub async fn recommendations_for(
    pool: &PgPool,
    cache: &Cache,
    model: &dyn LanguageModel,
    user_id: Uuid,
) -> AppResult<Vec<Recommendation>> {
    let entries = watchlist::list_entries(pool, user_id).await?;
    if entries.is_empty() {
        return Err(AppError::InvalidInput(
            "Add some anime to your watchlist first".to_string(),
        ));
    }

    cached!(
        cache,
        CacheKey::Recommendations(user_id),
        RECS_CACHE_TTL,
        async move {
            let prompt = build_prompt(&entries);

            tracing::info!(
                user_id = %user_id,
                entries = entries.len(),
                model = model.model_name(),
                "Requesting recommendations"
            );

            let raw = model.complete_json(SYSTEM_PROMPT, &prompt).await?;
            let recommendations = parse_recommendations(&raw)?;

            if recommendations.is_empty() {
                return Err(AppError::ExternalApi(
                    "Model returned no recommendations".to_string(),
                ));
            }

            tracing::info!(
                user_id = %user_id,
                count = recommendations.len(),
                "Recommendations generated"
            );

            Ok(recommendations)
        }
    )
}

/// Renders the user's taste as a prompt for the model
fn build_prompt(entries: &[WatchlistEntry]) -> String {
    let mut liked = Vec::new();
    let mut dropped = Vec::new();

    for entry in entries.iter().take(MAX_PROMPT_TITLES) {
        match entry.status {
            WatchStatus::Dropped => dropped.push(entry.title.as_str()),
            WatchStatus::PlanToWatch => {}
            _ => match entry.score {
                Some(score) => liked.push(format!("{} (scored {}/10)", entry.title, score)),
                None => liked.push(entry.title.clone()),
            },
        }
    }

    let watch_stats = stats::compute(entries);
    let genres: Vec<&str> = watch_stats
        .genres
        .iter()
        .take(5)
        .map(|g| g.genre.as_str())
        .collect();

    let mut prompt = String::new();
    if !liked.is_empty() {
        prompt.push_str(&format!("I have watched: {}.\n", liked.join(", ")));
    }
    if !genres.is_empty() {
        prompt.push_str(&format!("My most-watched genres: {}.\n", genres.join(", ")));
    }
    if !dropped.is_empty() {
        prompt.push_str(&format!(
            "I dropped these, avoid similar shows: {}.\n",
            dropped.join(", ")
        ));
    }
    prompt.push_str("Recommend anime I have not listed above.");

    prompt
}

/// Parses the model output into recommendations.
///
/// Accepts a bare JSON array or the documented envelope object, with or
/// without a markdown code fence around it. Anything else is an error.
fn parse_recommendations(raw: &str) -> AppResult<Vec<Recommendation>> {
    let cleaned = strip_code_fence(raw.trim());

    if let Ok(recommendations) = serde_json::from_str::<Vec<Recommendation>>(cleaned) {
        return Ok(recommendations);
    }

    if let Ok(envelope) = serde_json::from_str::<RecommendationEnvelope>(cleaned) {
        return Ok(envelope.recommendations);
    }

    Err(AppError::ExternalApi(
        "Model response was not a recommendation list".to_string(),
    ))
}

/// Drops a surrounding markdown code fence, if any
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Tolerate a language tag after the opening fence
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
