use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use anishelf::config::Config;
use anishelf::db;
use anishelf::routes::{create_router, AppState};
use anishelf::services::llm::{LanguageModel, OpenAiChat};
use anishelf::services::providers::{AniListProvider, CatalogProvider};
use anishelf::services::sync::SyncGuard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("anishelf=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    // Database
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    // Cache
    let redis_client =
        db::create_redis_client(&config.redis_url).context("Failed to create Redis client")?;
    let (cache, cache_writer) = db::Cache::new(redis_client).await;

    // External services
    let catalog: Arc<dyn CatalogProvider> = Arc::new(AniListProvider::new(
        cache.clone(),
        config.anilist_api_url.clone(),
    ));
    let model: Arc<dyn LanguageModel> = Arc::new(OpenAiChat::new(
        config.chat_api_key.clone(),
        config.chat_api_url.clone(),
        config.chat_model.clone(),
    ));

    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState {
        pool,
        cache,
        catalog,
        model,
        sync_guard: SyncGuard::new(),
        config: Arc::new(config),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await.context("Server error")?;

    // Flush pending cache writes before exiting
    cache_writer.shutdown().await;

    Ok(())
}
