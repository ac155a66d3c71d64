use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db::Cache;
use crate::middleware::auth::require_auth;
use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};
use crate::services::llm::LanguageModel;
use crate::services::providers::CatalogProvider;
use crate::services::sync::SyncGuard;

pub mod account;
pub mod anime;
pub mod auth;
pub mod friends;
pub mod notifications;
pub mod recommendations;
pub mod stats;
pub mod watchlist;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cache: Cache,
    pub catalog: Arc<dyn CatalogProvider>,
    pub model: Arc<dyn LanguageModel>,
    pub sync_guard: SyncGuard,
    pub config: Arc<Config>,
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes(state.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected = Router::new()
        // Account
        .route("/account", get(account::profile))
        .route("/account/anilist", post(account::link_anilist))
        .route("/account/anilist", delete(account::unlink_anilist))
        // Catalog
        .route("/anime/search", get(anime::search))
        .route("/anime/:media_id", get(anime::detail))
        // Watchlist
        .route("/watchlist", get(watchlist::list))
        .route("/watchlist/sync", post(watchlist::sync))
        .route("/watchlist/:media_id", put(watchlist::upsert))
        .route("/watchlist/:media_id", delete(watchlist::remove))
        // Statistics
        .route("/stats", get(stats::stats))
        // Friends
        .route("/friends", get(friends::list))
        .route("/friends/requests", get(friends::incoming))
        .route("/friends/requests", post(friends::send))
        .route("/friends/requests/:request_id/accept", post(friends::accept))
        .route("/friends/requests/:request_id/decline", post(friends::decline))
        .route("/friends/:user_id", delete(friends::remove))
        .route("/friends/:user_id/watchlist", get(friends::watchlist))
        // Notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/read-all", post(notifications::read_all))
        .route("/notifications/:notification_id/read", post(notifications::read))
        // Recommendations
        .route("/recommendations", get(recommendations::recommend))
        .route_layer(axum_middleware::from_fn_with_state(state, require_auth));

    public.merge(protected)
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
