use std::collections::HashMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use typed_builder::TypedBuilder;

use crate::common::{NewsletterId, NewsletterSourceId};
use crate::domains::newsletter::payload::Attachment;

use super::InsertOutcome;

/// One newsletter issue, shared by every user who received it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Newsletter {
    pub id: NewsletterId,
    pub source_id: NewsletterSourceId,
    /// SHA-256 of the whitespace-normalized plain text
    pub newsletter_hash: String,
    pub message_id: String,
    pub subject: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub html_content: Option<String>,
    pub text_content: Option<String>,
    pub extracted_content: String,
    pub excerpt: String,
    pub thumbnail_url: Option<String>,
    pub original_url: Option<String>,
    pub read_time_minutes: i32,
    pub tags: Json<Vec<String>>,
    pub category: Option<String>,
    pub headers: Json<HashMap<String, String>>,
    pub attachments: Json<Vec<Attachment>>,
    pub is_active: bool,
    pub received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct CreateNewsletter {
    pub source_id: NewsletterSourceId,
    #[builder(setter(into))]
    pub newsletter_hash: String,
    #[builder(setter(into))]
    pub message_id: String,
    #[builder(setter(into))]
    pub subject: String,
    #[builder(setter(into))]
    pub sender_email: String,
    #[builder(default)]
    pub sender_name: Option<String>,
    #[builder(default)]
    pub html_content: Option<String>,
    #[builder(default)]
    pub text_content: Option<String>,
    #[builder(default, setter(into))]
    pub extracted_content: String,
    #[builder(default, setter(into))]
    pub excerpt: String,
    #[builder(default)]
    pub thumbnail_url: Option<String>,
    #[builder(default)]
    pub original_url: Option<String>,
    #[builder(default = 1)]
    pub read_time_minutes: i32,
    #[builder(default)]
    pub tags: Vec<String>,
    #[builder(default)]
    pub category: Option<String>,
    #[builder(default)]
    pub headers: HashMap<String, String>,
    #[builder(default)]
    pub attachments: Vec<Attachment>,
    pub received_at: DateTime<Utc>,
}

impl Newsletter {
    pub async fn find_by_hash(hash: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM newsletters WHERE newsletter_hash = $1")
            .bind(hash)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Insert an issue, or return the stored issue with the same content hash.
    pub async fn create(input: &CreateNewsletter, pool: &PgPool) -> Result<InsertOutcome<Self>> {
        let inserted = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO newsletters (
                id, source_id, newsletter_hash, message_id, subject,
                sender_email, sender_name, html_content, text_content,
                extracted_content, excerpt, thumbnail_url, original_url,
                read_time_minutes, tags, category, headers, attachments, received_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19)
            ON CONFLICT (newsletter_hash) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(NewsletterId::new())
        .bind(input.source_id)
        .bind(&input.newsletter_hash)
        .bind(&input.message_id)
        .bind(&input.subject)
        .bind(&input.sender_email)
        .bind(&input.sender_name)
        .bind(&input.html_content)
        .bind(&input.text_content)
        .bind(&input.extracted_content)
        .bind(&input.excerpt)
        .bind(&input.thumbnail_url)
        .bind(&input.original_url)
        .bind(input.read_time_minutes)
        .bind(Json(&input.tags))
        .bind(&input.category)
        .bind(Json(&input.headers))
        .bind(Json(&input.attachments))
        .bind(input.received_at)
        .fetch_optional(pool)
        .await?;

        if let Some(newsletter) = inserted {
            return Ok(InsertOutcome::Created(newsletter));
        }

        Self::find_by_hash(&input.newsletter_hash, pool)
            .await?
            .map(InsertOutcome::Duplicate)
            .ok_or_else(|| {
                anyhow!(
                    "newsletter {} conflicted but could not be read back",
                    input.newsletter_hash
                )
            })
    }
}
