// TestDependencies - mock implementations for testing
//
// Provides an in-memory store and a scripted analyzer that can be injected
// into ServerDeps for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BaseNewsletterAnalyzer, BaseNewsletterStore, ServerDeps};
use crate::common::{
    NewsletterId, NewsletterSourceId, UserId, UserNewsletterId, UserNewsletterSourceId,
};
use crate::config::IngestSettings;
use crate::domains::newsletter::insights::{NewsletterInsights, PublisherProfile};
use crate::domains::newsletter::models::{
    CreateNewsletter, CreateNewsletterSource, InsertOutcome, Newsletter, NewsletterSource, User,
    UserNewsletter, UserNewsletterSource,
};

/// Webhook secret used by `TestDependencies` unless overridden.
pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

// =============================================================================
// In-memory Newsletter Store
// =============================================================================

#[derive(Default)]
struct StoreState {
    users: Vec<User>,
    sources: Vec<NewsletterSource>,
    newsletters: Vec<Newsletter>,
    source_links: Vec<UserNewsletterSource>,
    user_newsletters: Vec<UserNewsletter>,
}

impl StoreState {
    fn source_mut(&mut self, id: NewsletterSourceId) -> Result<&mut NewsletterSource> {
        self.sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow!("source {} not found", id))
    }

    /// Same counters the Postgres store recomputes.
    fn recount(&mut self, id: NewsletterSourceId) -> Result<NewsletterSource> {
        let subscribers = self
            .source_links
            .iter()
            .filter(|l| l.source_id == id && l.is_subscribed)
            .count() as i32;
        let newsletters = self.newsletters.iter().filter(|n| n.source_id == id).count() as i32;

        let source = self.source_mut(id)?;
        let now = Utc::now();
        source.subscriber_count = subscribers;
        source.total_newsletters = newsletters;
        source.last_newsletter_at = Some(now);
        source.updated_at = now;
        Ok(source.clone())
    }
}

/// Store double that enforces the same unique keys as the schema.
///
/// Every call yields to the runtime first, so concurrent requests interleave
/// between lookups and inserts the way they do against Postgres.
#[derive(Clone, Default)]
pub struct InMemoryNewsletterStore {
    state: Arc<Mutex<StoreState>>,
    ping_error: Arc<Mutex<Option<String>>>,
    write_error: Arc<Mutex<Option<String>>>,
    source_conflicts: Arc<Mutex<usize>>,
}

impl InMemoryNewsletterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user owning `inbox_email`
    pub fn seed_user(&self, email: &str, inbox_email: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            name: None,
            email: email.to_string(),
            inbox_email: Some(inbox_email.to_lowercase()),
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().users.push(user.clone());
        user
    }

    /// Insert a source as if it had already been refreshed `update_count` times
    pub fn seed_source(
        &self,
        email: &str,
        update_count: i32,
        profile: PublisherProfile,
    ) -> NewsletterSource {
        let now = Utc::now();
        let source = NewsletterSource {
            id: NewsletterSourceId::new(),
            email: email.to_lowercase(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            domain: email.split('@').nth(1).unwrap_or_default().to_string(),
            description: profile.description,
            category: profile.category,
            logo_url: profile.logo_url,
            website: profile.website,
            subscribe_url: profile.subscribe_url,
            region: profile.region.unwrap_or_default().as_str().to_string(),
            is_verified: false,
            is_featured: false,
            is_active: true,
            subscriber_count: 0,
            total_newsletters: 0,
            last_newsletter_at: None,
            update_count,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().sources.push(source.clone());
        source
    }

    /// Make `ping` fail with `message` (or succeed again with `None`)
    pub fn set_ping_error(&self, message: Option<&str>) {
        *self.ping_error.lock().unwrap() = message.map(str::to_string);
    }

    /// Make every write fail with `message` (or succeed again with `None`)
    pub fn fail_writes(&self, message: Option<&str>) {
        *self.write_error.lock().unwrap() = message.map(str::to_string);
    }

    /// `create_source` calls that lost to a concurrent insert of the same email
    pub fn source_conflicts(&self) -> usize {
        *self.source_conflicts.lock().unwrap()
    }

    async fn begin_write(&self) -> Result<()> {
        tokio::task::yield_now().await;
        match self.write_error.lock().unwrap().as_ref() {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(()),
        }
    }

    pub fn sources(&self) -> Vec<NewsletterSource> {
        self.state.lock().unwrap().sources.clone()
    }

    pub fn source_by_email(&self, email: &str) -> Option<NewsletterSource> {
        self.state
            .lock()
            .unwrap()
            .sources
            .iter()
            .find(|s| s.email == email)
            .cloned()
    }

    pub fn newsletters(&self) -> Vec<Newsletter> {
        self.state.lock().unwrap().newsletters.clone()
    }

    pub fn source_links(&self) -> Vec<UserNewsletterSource> {
        self.state.lock().unwrap().source_links.clone()
    }

    pub fn user_newsletters(&self) -> Vec<UserNewsletter> {
        self.state.lock().unwrap().user_newsletters.clone()
    }

    /// Number of rows across every write-side table
    pub fn write_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.sources.len()
            + state.newsletters.len()
            + state.source_links.len()
            + state.user_newsletters.len()
    }
}

#[async_trait]
impl BaseNewsletterStore for InMemoryNewsletterStore {
    async fn ping(&self) -> Result<()> {
        match self.ping_error.lock().unwrap().as_ref() {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(()),
        }
    }

    async fn find_user_by_inbox_email(&self, inbox_email: &str) -> Result<Option<User>> {
        tokio::task::yield_now().await;
        let wanted = inbox_email.to_lowercase();
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.inbox_email.as_deref().map(str::to_lowercase) == Some(wanted.clone()))
            .cloned())
    }

    async fn find_source_by_email(&self, email: &str) -> Result<Option<NewsletterSource>> {
        tokio::task::yield_now().await;
        Ok(self.source_by_email(email))
    }

    async fn find_source_by_id(&self, id: NewsletterSourceId) -> Result<Option<NewsletterSource>> {
        tokio::task::yield_now().await;
        Ok(self
            .state
            .lock()
            .unwrap()
            .sources
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn create_source(
        &self,
        input: &CreateNewsletterSource,
    ) -> Result<InsertOutcome<NewsletterSource>> {
        self.begin_write().await?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.sources.iter().find(|s| s.email == input.email) {
            *self.source_conflicts.lock().unwrap() += 1;
            return Ok(InsertOutcome::Duplicate(existing.clone()));
        }

        let now = Utc::now();
        let profile = input.profile.clone();
        let source = NewsletterSource {
            id: NewsletterSourceId::new(),
            email: input.email.clone(),
            name: input.name.clone(),
            domain: input.domain.clone(),
            description: profile.description,
            category: profile.category,
            logo_url: profile.logo_url,
            website: profile.website,
            subscribe_url: profile.subscribe_url,
            region: profile.region.unwrap_or_default().as_str().to_string(),
            is_verified: false,
            is_featured: false,
            is_active: true,
            subscriber_count: 0,
            total_newsletters: 0,
            last_newsletter_at: None,
            update_count: 0,
            created_at: now,
            updated_at: now,
        };
        state.sources.push(source.clone());
        Ok(InsertOutcome::Created(source))
    }

    async fn refresh_source_profile(
        &self,
        id: NewsletterSourceId,
        profile: &PublisherProfile,
        update_limit: i32,
    ) -> Result<NewsletterSource> {
        self.begin_write().await?;
        let mut state = self.state.lock().unwrap();
        let source = state.source_mut(id)?;
        if source.update_count < update_limit {
            let profile = profile.clone();
            source.description = profile.description.or(source.description.take());
            source.logo_url = profile.logo_url.or(source.logo_url.take());
            source.website = profile.website.or(source.website.take());
            source.category = profile.category.or(source.category.take());
            source.update_count += 1;
        }
        state.recount(id)
    }

    async fn touch_source_stats(&self, id: NewsletterSourceId) -> Result<NewsletterSource> {
        self.begin_write().await?;
        self.state.lock().unwrap().recount(id)
    }

    async fn find_newsletter_by_hash(&self, hash: &str) -> Result<Option<Newsletter>> {
        tokio::task::yield_now().await;
        Ok(self
            .state
            .lock()
            .unwrap()
            .newsletters
            .iter()
            .find(|n| n.newsletter_hash == hash)
            .cloned())
    }

    async fn insert_newsletter(
        &self,
        input: &CreateNewsletter,
    ) -> Result<InsertOutcome<Newsletter>> {
        self.begin_write().await?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .newsletters
            .iter()
            .find(|n| n.newsletter_hash == input.newsletter_hash)
        {
            return Ok(InsertOutcome::Duplicate(existing.clone()));
        }
        if !state.sources.iter().any(|s| s.id == input.source_id) {
            return Err(anyhow!("source {} does not exist", input.source_id));
        }

        let now = Utc::now();
        let newsletter = Newsletter {
            id: NewsletterId::new(),
            source_id: input.source_id,
            newsletter_hash: input.newsletter_hash.clone(),
            message_id: input.message_id.clone(),
            subject: input.subject.clone(),
            sender_email: input.sender_email.clone(),
            sender_name: input.sender_name.clone(),
            html_content: input.html_content.clone(),
            text_content: input.text_content.clone(),
            extracted_content: input.extracted_content.clone(),
            excerpt: input.excerpt.clone(),
            thumbnail_url: input.thumbnail_url.clone(),
            original_url: input.original_url.clone(),
            read_time_minutes: input.read_time_minutes,
            tags: Json(input.tags.clone()),
            category: input.category.clone(),
            headers: Json(input.headers.clone()),
            attachments: Json(input.attachments.clone()),
            is_active: true,
            received_at: input.received_at,
            created_at: now,
            updated_at: now,
        };
        state.newsletters.push(newsletter.clone());
        Ok(InsertOutcome::Created(newsletter))
    }

    async fn link_user_source(
        &self,
        user_id: UserId,
        source_id: NewsletterSourceId,
        subscription_email: &str,
    ) -> Result<InsertOutcome<UserNewsletterSource>> {
        self.begin_write().await?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .source_links
            .iter()
            .find(|l| l.user_id == user_id && l.source_id == source_id)
        {
            return Ok(InsertOutcome::Duplicate(existing.clone()));
        }

        let now = Utc::now();
        let link = UserNewsletterSource {
            id: UserNewsletterSourceId::new(),
            user_id,
            source_id,
            is_subscribed: true,
            is_active: true,
            is_paused: false,
            subscription_email: Some(subscription_email.to_string()),
            subscribed_at: now,
            unsubscribed_at: None,
            updated_at: now,
        };
        state.source_links.push(link.clone());
        Ok(InsertOutcome::Created(link))
    }

    async fn link_user_newsletter(
        &self,
        user_id: UserId,
        newsletter_id: NewsletterId,
    ) -> Result<InsertOutcome<UserNewsletter>> {
        self.begin_write().await?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .user_newsletters
            .iter()
            .find(|l| l.user_id == user_id && l.newsletter_id == newsletter_id)
        {
            return Ok(InsertOutcome::Duplicate(existing.clone()));
        }

        let entry = UserNewsletter {
            id: UserNewsletterId::new(),
            user_id,
            newsletter_id,
            is_read: false,
            is_bookmarked: false,
            is_archived: false,
            read_at: None,
            bookmarked_at: None,
            archived_at: None,
            created_at: Utc::now(),
        };
        state.user_newsletters.push(entry.clone());
        Ok(InsertOutcome::Created(entry))
    }
}

// =============================================================================
// Mock Newsletter Analyzer
// =============================================================================

/// Analyzer returning queued insights (or empty insights once the queue runs out).
#[derive(Clone, Default)]
pub struct MockNewsletterAnalyzer {
    responses: Arc<Mutex<Vec<NewsletterInsights>>>,
    calls: Arc<Mutex<Vec<String>>>,
    error: Option<String>,
    delay: Option<Duration>,
}

impl MockNewsletterAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add insights to the response queue
    pub fn with_insights(self, insights: NewsletterInsights) -> Self {
        self.responses.lock().unwrap().push(insights);
        self
    }

    /// Fail every call with `message`
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BaseNewsletterAnalyzer for MockNewsletterAnalyzer {
    async fn analyze(&self, html: &str) -> Result<NewsletterInsights> {
        self.calls.lock().unwrap().push(html.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.error {
            return Err(anyhow!("{}", message));
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(NewsletterInsights::default())
        } else {
            Ok(responses.remove(0))
        }
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub store: Arc<InMemoryNewsletterStore>,
    pub analyzer: Option<Arc<MockNewsletterAnalyzer>>,
    pub settings: IngestSettings,
    pub webhook_secret: Option<String>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryNewsletterStore::new()),
            analyzer: Some(Arc::new(MockNewsletterAnalyzer::new())),
            settings: IngestSettings::default(),
            webhook_secret: Some(TEST_WEBHOOK_SECRET.to_string()),
        }
    }

    /// Set a mock analyzer
    pub fn mock_analyzer(mut self, analyzer: MockNewsletterAnalyzer) -> Self {
        self.analyzer = Some(Arc::new(analyzer));
        self
    }

    /// Run extraction heuristic-only
    pub fn without_analyzer(mut self) -> Self {
        self.analyzer = None;
        self
    }

    pub fn webhook_secret(mut self, secret: Option<&str>) -> Self {
        self.webhook_secret = secret.map(str::to_string);
        self
    }

    pub fn settings(mut self, settings: IngestSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Convert into ServerDeps for testing
    pub fn into_deps(self) -> Arc<ServerDeps> {
        Arc::new(ServerDeps::new(
            self.store,
            self.analyzer.map(|a| a as Arc<dyn BaseNewsletterAnalyzer>),
            self.settings,
            self.webhook_secret,
        ))
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
