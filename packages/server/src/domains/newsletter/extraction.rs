//! Turns a raw email body into the fields stored on a newsletter.
//!
//! Heuristics always run. The analyzer, when configured, is asked for the
//! same fields plus publisher details; its non-empty answers win. A newsletter
//! already stored for a frozen source is not re-analyzed.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::common::utils::{generate_newsletter_hash, normalize_whitespace};
use crate::config::IngestSettings;
use crate::kernel::{BaseNewsletterAnalyzer, BaseNewsletterStore, ServerDeps};

use super::email_parser::{self, MAX_TAGS};
use super::insights::{non_blank, NewsletterInsights, PublisherProfile};

/// Where the descriptive fields of a `ParsedNewsletter` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightsOrigin {
    Heuristic,
    Ai,
    /// Copied from the stored newsletter and its frozen source.
    Frozen,
}

#[derive(Debug, Clone)]
pub struct ParsedNewsletter {
    /// Persisted instead of the raw HTML
    pub sanitized_html: Option<String>,
    pub extracted_content: String,
    pub excerpt: String,
    pub thumbnail_url: Option<String>,
    pub original_url: Option<String>,
    pub read_time_minutes: i32,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub newsletter_hash: String,
    pub publisher: PublisherProfile,
    pub origin: InsightsOrigin,
}

/// Fields filled by heuristics and optionally overridden by the analyzer.
#[derive(Debug, Clone, Default, PartialEq)]
struct Descriptors {
    thumbnail_url: Option<String>,
    original_url: Option<String>,
    category: Option<String>,
    tags: Vec<String>,
}

impl Descriptors {
    fn heuristic(html: Option<&str>, text: &str, subject: &str) -> Self {
        Self {
            thumbnail_url: html.and_then(email_parser::extract_thumbnail_url),
            original_url: html.and_then(email_parser::extract_original_url),
            category: email_parser::categorize_newsletter(text, subject)
                .map(|c| c.as_str().to_string()),
            tags: email_parser::extract_tags(text, subject),
        }
    }

    /// Non-empty analyzer values win; heuristics fill the rest.
    fn merge(self, insights: &NewsletterInsights) -> Self {
        let ai_tags = clean_tags(&insights.tags);
        Self {
            thumbnail_url: non_blank(insights.thumbnail_url.clone()).or(self.thumbnail_url),
            original_url: non_blank(insights.original_url.clone()).or(self.original_url),
            category: non_blank(insights.category.clone())
                .map(|c| c.to_uppercase())
                .or(self.category),
            tags: if ai_tags.is_empty() { self.tags } else { ai_tags },
        }
    }
}

/// Dedup key for an email.
///
/// Emails with visible text are keyed by that text alone. Image-only emails
/// have no text to compare, so the sender and the sanitized markup are used
/// instead.
fn fingerprint(sender_email: &str, text: &str, sanitized_html: Option<&str>) -> String {
    if !text.is_empty() {
        return generate_newsletter_hash(text);
    }
    generate_newsletter_hash(&format!(
        "{}\n{}",
        sender_email,
        sanitized_html.unwrap_or_default()
    ))
}

/// Trimmed, lower-cased, deduplicated and capped.
fn clean_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .take(MAX_TAGS)
        .collect()
}

pub struct NewsletterExtractor {
    store: Arc<dyn BaseNewsletterStore>,
    analyzer: Option<Arc<dyn BaseNewsletterAnalyzer>>,
    settings: IngestSettings,
}

impl NewsletterExtractor {
    pub fn new(
        store: Arc<dyn BaseNewsletterStore>,
        analyzer: Option<Arc<dyn BaseNewsletterAnalyzer>>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            store,
            analyzer,
            settings,
        }
    }

    pub fn from_deps(deps: &ServerDeps) -> Self {
        Self::new(
            deps.store.clone(),
            deps.analyzer.clone(),
            deps.settings.clone(),
        )
    }

    pub async fn extract(
        &self,
        sender_email: &str,
        html: Option<&str>,
        text: Option<&str>,
        subject: &str,
    ) -> Result<ParsedNewsletter> {
        let sanitized_html = html
            .filter(|h| !h.trim().is_empty())
            .map(email_parser::sanitize_html);

        let mut extracted_content = sanitized_html
            .as_deref()
            .map(email_parser::html_to_text)
            .unwrap_or_default();
        if extracted_content.is_empty() {
            extracted_content = normalize_whitespace(text.unwrap_or_default());
        }

        let newsletter_hash =
            fingerprint(sender_email, &extracted_content, sanitized_html.as_deref());
        let excerpt = email_parser::generate_excerpt(&extracted_content);
        let read_time_minutes =
            email_parser::calculate_reading_time(&extracted_content, self.settings.reading_wpm);

        let heuristic = Descriptors::heuristic(sanitized_html.as_deref(), &extracted_content, subject);

        let (descriptors, publisher, origin) = match self.frozen_fields(&newsletter_hash, sender_email).await? {
            Some((descriptors, publisher)) => (descriptors, publisher, InsightsOrigin::Frozen),
            None => match self.analyze(sanitized_html.as_deref()).await {
                Some(insights) => (
                    heuristic.merge(&insights),
                    PublisherProfile::from(insights.source),
                    InsightsOrigin::Ai,
                ),
                None => (heuristic, PublisherProfile::default(), InsightsOrigin::Heuristic),
            },
        };

        debug!(
            hash = %newsletter_hash,
            origin = ?origin,
            category = ?descriptors.category,
            tags = descriptors.tags.len(),
            "Newsletter extracted"
        );

        Ok(ParsedNewsletter {
            sanitized_html,
            extracted_content,
            excerpt,
            thumbnail_url: descriptors.thumbnail_url,
            original_url: descriptors.original_url,
            read_time_minutes,
            tags: descriptors.tags,
            category: descriptors.category,
            newsletter_hash,
            publisher,
            origin,
        })
    }

    /// Stored fields for a known newsletter from the same sender whose source
    /// no longer accepts updates.
    async fn frozen_fields(
        &self,
        hash: &str,
        sender_email: &str,
    ) -> Result<Option<(Descriptors, PublisherProfile)>> {
        let Some(newsletter) = self
            .store
            .find_newsletter_by_hash(hash)
            .await
            .context("Failed to look up newsletter by hash")?
        else {
            return Ok(None);
        };

        if newsletter.sender_email != sender_email {
            return Ok(None);
        }

        let Some(source) = self
            .store
            .find_source_by_id(newsletter.source_id)
            .await
            .context("Failed to load newsletter source")?
        else {
            return Ok(None);
        };

        if !source.is_frozen(self.settings.source_update_limit) {
            return Ok(None);
        }

        info!(
            source_id = %source.id,
            update_count = source.update_count,
            "Source frozen, reusing stored newsletter fields"
        );

        let descriptors = Descriptors {
            thumbnail_url: newsletter.thumbnail_url,
            original_url: newsletter.original_url,
            category: newsletter.category,
            tags: newsletter.tags.0,
        };
        Ok(Some((descriptors, source.publisher_profile())))
    }

    /// Best effort: failures and timeouts are logged and yield `None`.
    async fn analyze(&self, html: Option<&str>) -> Option<NewsletterInsights> {
        let analyzer = self.analyzer.as_ref()?;
        let html = html?;

        match tokio::time::timeout(self.settings.ai_timeout, analyzer.analyze(html)).await {
            Ok(Ok(insights)) => Some(insights),
            Ok(Err(e)) => {
                warn!(error = %e, "Newsletter analysis failed, using heuristics");
                None
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.settings.ai_timeout.as_secs(),
                    "Newsletter analysis timed out, using heuristics"
                );
                None
            }
        }
    }
}
