use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use typed_builder::TypedBuilder;

use crate::common::NewsletterSourceId;
use crate::domains::newsletter::insights::{PublisherProfile, Region};

use super::InsertOutcome;

/// Newsletter publisher, keyed by sender email.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NewsletterSource {
    pub id: NewsletterSourceId,
    pub email: String,
    pub name: String,
    pub domain: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub logo_url: Option<String>,
    pub website: Option<String>,
    pub subscribe_url: Option<String>,
    pub region: String,
    pub is_verified: bool,
    pub is_featured: bool,
    pub is_active: bool,
    /// Cached count of subscribed user links
    pub subscriber_count: i32,
    /// Cached count of newsletters
    pub total_newsletters: i32,
    pub last_newsletter_at: Option<DateTime<Utc>>,
    /// Number of descriptive refreshes applied so far
    pub update_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a source on first contact.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CreateNewsletterSource {
    #[builder(setter(into))]
    pub email: String,
    #[builder(setter(into))]
    pub name: String,
    #[builder(setter(into))]
    pub domain: String,
    #[builder(default)]
    pub profile: PublisherProfile,
}

/// A source whose cached counters disagree with the link and newsletter tables.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SourceCountDrift {
    pub id: NewsletterSourceId,
    pub email: String,
    pub subscriber_count: i32,
    pub actual_subscribers: i64,
    pub total_newsletters: i32,
    pub actual_newsletters: i64,
}

/// Live counts per source, shared by the drift report and the fix-up.
const ACTUAL_COUNTS: &str = r#"
    SELECT s.id,
           (SELECT COUNT(*) FROM user_newsletter_sources l
             WHERE l.source_id = s.id AND l.is_subscribed) AS actual_subscribers,
           (SELECT COUNT(*) FROM newsletters n
             WHERE n.source_id = s.id) AS actual_newsletters
      FROM newsletter_sources s
"#;

impl NewsletterSource {
    /// Descriptive fields are frozen once `update_count` reaches `limit`.
    pub fn is_frozen(&self, limit: i32) -> bool {
        self.update_count >= limit
    }

    pub fn region(&self) -> Region {
        Region::parse(&self.region).unwrap_or_default()
    }

    /// Stored publisher fields, in the shape the extractor produces.
    pub fn publisher_profile(&self) -> PublisherProfile {
        PublisherProfile {
            description: self.description.clone(),
            logo_url: self.logo_url.clone(),
            category: self.category.clone(),
            website: self.website.clone(),
            region: Some(self.region()),
            subscribe_url: self.subscribe_url.clone(),
        }
    }

    pub async fn find_by_id(id: NewsletterSourceId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM newsletter_sources WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_email(email: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM newsletter_sources WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Insert a source, or return the row a concurrent request created first.
    pub async fn create(
        input: &CreateNewsletterSource,
        pool: &PgPool,
    ) -> Result<InsertOutcome<Self>> {
        let profile = &input.profile;

        let inserted = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO newsletter_sources (
                id, email, name, domain, description, category,
                logo_url, website, subscribe_url, region
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (email) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(NewsletterSourceId::new())
        .bind(&input.email)
        .bind(&input.name)
        .bind(&input.domain)
        .bind(&profile.description)
        .bind(&profile.category)
        .bind(&profile.logo_url)
        .bind(&profile.website)
        .bind(&profile.subscribe_url)
        .bind(profile.region.unwrap_or_default().as_str())
        .fetch_optional(pool)
        .await?;

        if let Some(source) = inserted {
            return Ok(InsertOutcome::Created(source));
        }

        Self::find_by_email(&input.email, pool)
            .await?
            .map(InsertOutcome::Duplicate)
            .ok_or_else(|| anyhow!("source {} conflicted but could not be read back", input.email))
    }

    /// Overwrite descriptive fields with non-empty profile values and bump
    /// `update_count`, then refresh statistics.
    ///
    /// The limit is re-checked inside the statement so concurrent refreshes
    /// can never push a source past it; a frozen source only gets its
    /// statistics refreshed.
    pub async fn refresh_profile(
        id: NewsletterSourceId,
        profile: &PublisherProfile,
        update_limit: i32,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE newsletter_sources
            SET description = CASE WHEN update_count < $6 THEN COALESCE($2, description) ELSE description END,
                logo_url = CASE WHEN update_count < $6 THEN COALESCE($3, logo_url) ELSE logo_url END,
                website = CASE WHEN update_count < $6 THEN COALESCE($4, website) ELSE website END,
                category = CASE WHEN update_count < $6 THEN COALESCE($5, category) ELSE category END,
                update_count = CASE WHEN update_count < $6 THEN update_count + 1 ELSE update_count END,
                subscriber_count = (SELECT COUNT(*) FROM user_newsletter_sources
                                     WHERE source_id = $1 AND is_subscribed)::int,
                total_newsletters = (SELECT COUNT(*) FROM newsletters WHERE source_id = $1)::int,
                last_newsletter_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&profile.description)
        .bind(&profile.logo_url)
        .bind(&profile.website)
        .bind(&profile.category)
        .bind(update_limit)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Refresh statistics only.
    pub async fn touch_stats(id: NewsletterSourceId, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE newsletter_sources
            SET subscriber_count = (SELECT COUNT(*) FROM user_newsletter_sources
                                     WHERE source_id = $1 AND is_subscribed)::int,
                total_newsletters = (SELECT COUNT(*) FROM newsletters WHERE source_id = $1)::int,
                last_newsletter_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_count_drift(pool: &PgPool) -> Result<Vec<SourceCountDrift>> {
        sqlx::query_as::<_, SourceCountDrift>(&format!(
            r#"
            WITH actual AS ({ACTUAL_COUNTS})
            SELECT s.id, s.email,
                   s.subscriber_count, a.actual_subscribers,
                   s.total_newsletters, a.actual_newsletters
              FROM newsletter_sources s
              JOIN actual a ON a.id = s.id
             WHERE s.subscriber_count <> a.actual_subscribers
                OR s.total_newsletters <> a.actual_newsletters
             ORDER BY s.email
            "#
        ))
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Rewrite drifted counters. Returns the number of sources fixed.
    pub async fn reconcile_counts(pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(&format!(
            r#"
            WITH actual AS ({ACTUAL_COUNTS})
            UPDATE newsletter_sources s
               SET subscriber_count = a.actual_subscribers::int,
                   total_newsletters = a.actual_newsletters::int,
                   updated_at = NOW()
              FROM actual a
             WHERE a.id = s.id
               AND (s.subscriber_count <> a.actual_subscribers
                    OR s.total_newsletters <> a.actual_newsletters)
            "#
        ))
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
