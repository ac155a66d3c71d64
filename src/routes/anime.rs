use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{error::AppResult, models::Anime, routes::AppState};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: String,
}

/// Handler for catalog search
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<Vec<Anime>>> {
    let results = state.catalog.search(&params.q).await?;
    Ok(Json(results))
}

/// Handler for catalog detail
pub async fn detail(
    State(state): State<AppState>,
    Path(media_id): Path<i32>,
) -> AppResult<Json<Anime>> {
    let anime = state.catalog.detail(media_id).await?;
    Ok(Json(anime))
}
