//! Test harnesses for integration testing.
//!
//! `WebhookHarness` drives the real router against the in-memory store and
//! mock analyzer. `PostgresHarness` runs against a shared testcontainers
//! Postgres; containers and migrations are initialized once, then reused.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use lettertree_core::domains::newsletter::models::User;
use lettertree_core::kernel::{
    InMemoryNewsletterStore, MockNewsletterAnalyzer, PostgresNewsletterStore, TestDependencies,
};
use lettertree_core::server::build_app;
use serde_json::Value;
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use tower::ServiceExt;

use super::{signed_json_request, ALICE_INBOX};

/// Initialize a test subscriber that respects RUST_LOG.
/// Run tests with: RUST_LOG=debug cargo test -- --nocapture
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// In-memory webhook harness
// =============================================================================

pub struct WebhookHarness {
    pub store: Arc<InMemoryNewsletterStore>,
    pub analyzer: Option<Arc<MockNewsletterAnalyzer>>,
    pub app: Router,
}

impl WebhookHarness {
    /// Router with a mock analyzer and a user owning `ALICE_INBOX`.
    pub fn new() -> Self {
        Self::with_deps(TestDependencies::new())
    }

    pub fn with_deps(deps: TestDependencies) -> Self {
        init_tracing();

        let store = deps.store.clone();
        let analyzer = deps.analyzer.clone();
        store.seed_user("alice@example.com", ALICE_INBOX);

        Self {
            store,
            analyzer,
            app: build_app(deps.into_deps()),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    /// Sign and deliver `payload`.
    pub async fn deliver(&self, payload: &Value) -> (StatusCode, Value) {
        self.send(signed_json_request(payload)).await
    }

    pub fn analyzer_calls(&self) -> usize {
        self.analyzer.as_ref().map(|a| a.call_count()).unwrap_or(0)
    }
}

// =============================================================================
// Postgres harness (testcontainers)
// =============================================================================

/// Shared test infrastructure that persists across all tests.
struct SharedTestInfra {
    db_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        init_tracing();

        let postgres = Postgres::default()
            .with_tag("16")
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!(
            "postgresql://postgres:postgres@{}:{}/postgres",
            pg_host, pg_port
        );

        // Run migrations once on the shared database
        let pool = PgPool::connect(&db_url)
            .await
            .context("Failed to connect to Postgres for migrations")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            db_url,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Postgres-backed store sharing one database across tests.
///
/// Tests must use unique addresses (see `unique_email`) since rows persist
/// between tests.
pub struct PostgresHarness {
    pub db_pool: PgPool,
    pub store: PostgresNewsletterStore,
}

impl AsyncTestContext for PostgresHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        // Database pool is automatically dropped
    }
}

impl PostgresHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;

        let db_pool = PgPool::connect(&infra.db_url)
            .await
            .context("Failed to connect to test database")?;

        Ok(Self {
            store: PostgresNewsletterStore::new(db_pool.clone()),
            db_pool,
        })
    }

    /// A user with a fresh inbox address; returns the user and the address.
    pub async fn create_user(&self) -> Result<(User, String)> {
        let local = uuid::Uuid::new_v4().simple().to_string();
        let inbox = format!("{}@lettertr.ee", local);
        let user = User::create(
            &format!("{}@example.com", local),
            &inbox,
            Some("Test User"),
            &self.db_pool,
        )
        .await?;
        Ok((user, inbox))
    }
}

/// Address unique to this test run.
pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.org", prefix, uuid::Uuid::new_v4().simple())
}
