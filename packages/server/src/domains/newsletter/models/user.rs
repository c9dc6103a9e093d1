use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::UserId;

/// Account row owned by the auth provider. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub name: Option<String>,
    pub email: String,
    /// `<name>@<inbox domain>` forwarding address
    pub inbox_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub async fn find_by_inbox_email(inbox_email: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM users WHERE LOWER(inbox_email) = LOWER($1)")
            .bind(inbox_email)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Test and seed helper; production rows are created by the auth provider.
    pub async fn create(
        email: &str,
        inbox_email: &str,
        name: Option<&str>,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO users (id, name, email, inbox_email)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(UserId::new())
        .bind(name)
        .bind(email)
        .bind(inbox_email.to_lowercase())
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}
