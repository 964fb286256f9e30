use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use course_recommender::{
    config::{Config, IndexSource},
    db::{self, CourseCatalog, PgCourseCatalog},
    recommender::{ArtifactLoader, ModelHandle},
    routes::{create_router, AppState},
    services::RecommendationService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "course_recommender=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to the course database")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    let catalog: Arc<dyn CourseCatalog> = Arc::new(PgCourseCatalog::new(pool));

    let mut loader = ArtifactLoader::new(config.generation_dir());
    if config.index_source == IndexSource::Catalog {
        loader = loader.with_catalog_snapshot(catalog.clone());
    }
    let model = ModelHandle::new(Arc::new(loader));

    // Serving without a model is not an option
    let generation = model.get().await.with_context(|| {
        format!(
            "Failed to load model generation from {}",
            config.generation_dir().display()
        )
    })?;
    tracing::info!(
        generation = %generation.name(),
        exported_at = %generation.manifest().exported_at,
        "Model generation ready"
    );

    let mut recommender = RecommendationService::new(model, catalog.clone())
        .exclude_query_course(config.exclude_query_course);

    let cache_handle = match &config.redis_url {
        Some(redis_url) => {
            let client = db::create_redis_client(redis_url)?;
            let (cache, handle) = db::Cache::new(client)
                .await
                .context("Failed to connect to Redis")?;
            recommender = recommender.with_cache(cache, config.recommendation_cache_ttl);
            tracing::info!(ttl = config.recommendation_cache_ttl, "Recommendation cache enabled");
            Some(handle)
        }
        None => {
            tracing::info!("REDIS_URL not set, recommendation cache disabled");
            None
        }
    };

    let state = Arc::new(AppState {
        catalog,
        recommender,
    });
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_handle {
        handle.shutdown().await;
    }
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
