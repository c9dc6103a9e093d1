//! Postgres implementation of `BaseNewsletterStore`.
//!
//! A thin adapter over the model methods; the SQL lives with the models.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use super::BaseNewsletterStore;
use crate::common::{NewsletterId, NewsletterSourceId, UserId};
use crate::domains::newsletter::insights::PublisherProfile;
use crate::domains::newsletter::models::{
    CreateNewsletter, CreateNewsletterSource, InsertOutcome, Newsletter, NewsletterSource, User,
    UserNewsletter, UserNewsletterSource,
};

#[derive(Clone)]
pub struct PostgresNewsletterStore {
    pool: PgPool,
}

impl PostgresNewsletterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseNewsletterStore for PostgresNewsletterStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user_by_inbox_email(&self, inbox_email: &str) -> Result<Option<User>> {
        User::find_by_inbox_email(inbox_email, &self.pool).await
    }

    async fn find_source_by_email(&self, email: &str) -> Result<Option<NewsletterSource>> {
        NewsletterSource::find_by_email(email, &self.pool).await
    }

    async fn find_source_by_id(&self, id: NewsletterSourceId) -> Result<Option<NewsletterSource>> {
        NewsletterSource::find_by_id(id, &self.pool).await
    }

    async fn create_source(
        &self,
        input: &CreateNewsletterSource,
    ) -> Result<InsertOutcome<NewsletterSource>> {
        NewsletterSource::create(input, &self.pool).await
    }

    async fn refresh_source_profile(
        &self,
        id: NewsletterSourceId,
        profile: &PublisherProfile,
        update_limit: i32,
    ) -> Result<NewsletterSource> {
        NewsletterSource::refresh_profile(id, profile, update_limit, &self.pool).await
    }

    async fn touch_source_stats(&self, id: NewsletterSourceId) -> Result<NewsletterSource> {
        NewsletterSource::touch_stats(id, &self.pool).await
    }

    async fn find_newsletter_by_hash(&self, hash: &str) -> Result<Option<Newsletter>> {
        Newsletter::find_by_hash(hash, &self.pool).await
    }

    async fn insert_newsletter(
        &self,
        input: &CreateNewsletter,
    ) -> Result<InsertOutcome<Newsletter>> {
        Newsletter::create(input, &self.pool).await
    }

    async fn link_user_source(
        &self,
        user_id: UserId,
        source_id: NewsletterSourceId,
        subscription_email: &str,
    ) -> Result<InsertOutcome<UserNewsletterSource>> {
        UserNewsletterSource::link(user_id, source_id, subscription_email, &self.pool).await
    }

    async fn link_user_newsletter(
        &self,
        user_id: UserId,
        newsletter_id: NewsletterId,
    ) -> Result<InsertOutcome<UserNewsletter>> {
        UserNewsletter::link(user_id, newsletter_id, &self.pool).await
    }
}
