// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (source refresh rules, dedup handling) lives in
// domains::newsletter::ingest and only talks to these traits.
//
// Naming convention: Base* for trait names (e.g., BaseNewsletterStore)

use anyhow::Result;
use async_trait::async_trait;

use crate::common::{NewsletterId, NewsletterSourceId, UserId};
use crate::domains::newsletter::insights::{NewsletterInsights, PublisherProfile};
use crate::domains::newsletter::models::{
    CreateNewsletter, CreateNewsletterSource, InsertOutcome, Newsletter, NewsletterSource, User,
    UserNewsletter, UserNewsletterSource,
};

// =============================================================================
// Newsletter Store Trait (Infrastructure - persistence)
// =============================================================================

/// Persistence for the ingestion pipeline.
///
/// Inserts never fail on a unique-key conflict: they return
/// `InsertOutcome::Duplicate` with the row that won.
#[async_trait]
pub trait BaseNewsletterStore: Send + Sync {
    /// Cheap round trip for health checks
    async fn ping(&self) -> Result<()>;

    async fn find_user_by_inbox_email(&self, inbox_email: &str) -> Result<Option<User>>;

    async fn find_source_by_email(&self, email: &str) -> Result<Option<NewsletterSource>>;

    async fn find_source_by_id(&self, id: NewsletterSourceId) -> Result<Option<NewsletterSource>>;

    async fn create_source(
        &self,
        input: &CreateNewsletterSource,
    ) -> Result<InsertOutcome<NewsletterSource>>;

    /// Apply non-empty profile fields and bump `update_count`, unless the
    /// source already reached `update_limit`. Statistics are refreshed either way.
    async fn refresh_source_profile(
        &self,
        id: NewsletterSourceId,
        profile: &PublisherProfile,
        update_limit: i32,
    ) -> Result<NewsletterSource>;

    /// Recompute counters and bump `last_newsletter_at` without touching
    /// descriptive fields.
    async fn touch_source_stats(&self, id: NewsletterSourceId) -> Result<NewsletterSource>;

    async fn find_newsletter_by_hash(&self, hash: &str) -> Result<Option<Newsletter>>;

    async fn insert_newsletter(&self, input: &CreateNewsletter)
        -> Result<InsertOutcome<Newsletter>>;

    async fn link_user_source(
        &self,
        user_id: UserId,
        source_id: NewsletterSourceId,
        subscription_email: &str,
    ) -> Result<InsertOutcome<UserNewsletterSource>>;

    async fn link_user_newsletter(
        &self,
        user_id: UserId,
        newsletter_id: NewsletterId,
    ) -> Result<InsertOutcome<UserNewsletter>>;
}

// =============================================================================
// Newsletter Analyzer Trait (Infrastructure - LLM enrichment)
// =============================================================================

#[async_trait]
pub trait BaseNewsletterAnalyzer: Send + Sync {
    /// Structured insights for one sanitized newsletter HTML body
    async fn analyze(&self, html: &str) -> Result<NewsletterInsights>;
}
