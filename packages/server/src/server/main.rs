// Main entry point for the ingestion server

use std::sync::Arc;

use anyhow::{Context, Result};
use gemini_client::GeminiClient;
use lettertree_core::kernel::{
    BaseNewsletterAnalyzer, GeminiNewsletterAnalyzer, PostgresNewsletterStore, ServerDeps,
};
use lettertree_core::{server::build_app, Config};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lettertree_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lettertree ingestion server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    if config.webhook_secret.is_none() {
        tracing::warn!("CLOUDFLARE_EMAIL_WEBHOOK_SECRET not set, the email webhook will answer 500");
    }

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // AI enrichment is optional
    let analyzer: Option<Arc<dyn BaseNewsletterAnalyzer>> = match &config.gemini_api_key {
        Some(api_key) => {
            let client = GeminiClient::new(api_key.clone())
                .with_timeout(config.ingest.ai_timeout)
                .context("Failed to build Gemini client")?;
            tracing::info!(model = %config.gemini_model, "Newsletter analysis enabled");
            Some(Arc::new(GeminiNewsletterAnalyzer::new(
                client,
                config.gemini_model.clone(),
            )))
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set, newsletter extraction is heuristic-only");
            None
        }
    };

    let deps = Arc::new(ServerDeps::new(
        Arc::new(PostgresNewsletterStore::new(pool)),
        analyzer,
        config.ingest.clone(),
        config.webhook_secret.clone(),
    ));

    // Build application
    let app = build_app(deps);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Email webhook: http://localhost:{}/api/webhook/email", config.port);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
