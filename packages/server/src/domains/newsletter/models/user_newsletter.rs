use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{NewsletterId, UserId, UserNewsletterId};

use super::InsertOutcome;

/// A newsletter in a user's inbox.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserNewsletter {
    pub id: UserNewsletterId,
    pub user_id: UserId,
    pub newsletter_id: NewsletterId,
    pub is_read: bool,
    pub is_bookmarked: bool,
    pub is_archived: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub bookmarked_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserNewsletter {
    pub async fn find(
        user_id: UserId,
        newsletter_id: NewsletterId,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM user_newsletters WHERE user_id = $1 AND newsletter_id = $2",
        )
        .bind(user_id)
        .bind(newsletter_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn count_for_user(user_id: UserId, pool: &PgPool) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_newsletters WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .map_err(Into::into)
    }

    /// Put a newsletter in a user's inbox; redelivery keeps the existing entry.
    pub async fn link(
        user_id: UserId,
        newsletter_id: NewsletterId,
        pool: &PgPool,
    ) -> Result<InsertOutcome<Self>> {
        let inserted = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO user_newsletters (id, user_id, newsletter_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, newsletter_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(UserNewsletterId::new())
        .bind(user_id)
        .bind(newsletter_id)
        .fetch_optional(pool)
        .await?;

        if let Some(entry) = inserted {
            return Ok(InsertOutcome::Created(entry));
        }

        Self::find(user_id, newsletter_id, pool)
            .await?
            .map(InsertOutcome::Duplicate)
            .ok_or_else(|| anyhow!("inbox entry {user_id}/{newsletter_id} conflicted but is missing"))
    }
}
