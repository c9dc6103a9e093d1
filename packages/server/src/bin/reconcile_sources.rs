//! CLI for reconciling cached newsletter source counters
//!
//! `subscriber_count` and `total_newsletters` are recomputed on every
//! ingestion, but a source that stops sending keeps stale values after
//! unsubscribes or deletes. This binary reports and fixes that drift.
//! Output is JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lettertree_core::config::Config;
use lettertree_core::domains::newsletter::models::{NewsletterSource, SourceCountDrift};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Parser)]
#[command(name = "reconcile_sources")]
#[command(about = "Report or fix drifted newsletter source counters")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List sources whose counters disagree with the link and newsletter tables
    Check,

    /// Rewrite drifted counters
    Apply,
}

#[derive(Serialize)]
struct Response {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    drift: Option<Vec<SourceCountDrift>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let pool = get_pool().await?;

    let response = match cli.command {
        Commands::Check => {
            let drift = NewsletterSource::find_count_drift(&pool).await?;
            Response {
                success: true,
                drift: Some(drift),
                updated: None,
            }
        }
        Commands::Apply => {
            let updated = NewsletterSource::reconcile_counts(&pool).await?;
            tracing::info!(updated, "Source counters reconciled");
            Response {
                success: true,
                drift: None,
                updated: Some(updated),
            }
        }
    };

    println!(
        "{}",
        serde_json::to_string(&response).context("Failed to serialize response")?
    );
    Ok(())
}

async fn get_pool() -> Result<PgPool> {
    let config = Config::from_env().context("Failed to load configuration")?;
    PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")
}
