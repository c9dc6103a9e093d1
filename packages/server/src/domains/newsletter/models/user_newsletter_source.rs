use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{NewsletterSourceId, UserId, UserNewsletterSourceId};

use super::InsertOutcome;

/// A user's subscription to a source. Created subscribed on first receipt.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserNewsletterSource {
    pub id: UserNewsletterSourceId,
    pub user_id: UserId,
    pub source_id: NewsletterSourceId,
    pub is_subscribed: bool,
    pub is_active: bool,
    pub is_paused: bool,
    /// Inbox address the subscription was delivered to
    pub subscription_email: Option<String>,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl UserNewsletterSource {
    pub async fn find(
        user_id: UserId,
        source_id: NewsletterSourceId,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM user_newsletter_sources WHERE user_id = $1 AND source_id = $2",
        )
        .bind(user_id)
        .bind(source_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Link a user to a source. An existing link is left untouched, including
    /// one the user unsubscribed from.
    pub async fn link(
        user_id: UserId,
        source_id: NewsletterSourceId,
        subscription_email: &str,
        pool: &PgPool,
    ) -> Result<InsertOutcome<Self>> {
        let inserted = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO user_newsletter_sources (id, user_id, source_id, subscription_email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, source_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(UserNewsletterSourceId::new())
        .bind(user_id)
        .bind(source_id)
        .bind(subscription_email)
        .fetch_optional(pool)
        .await?;

        if let Some(link) = inserted {
            return Ok(InsertOutcome::Created(link));
        }

        Self::find(user_id, source_id, pool)
            .await?
            .map(InsertOutcome::Duplicate)
            .ok_or_else(|| anyhow!("subscription {user_id}/{source_id} conflicted but is missing"))
    }
}
