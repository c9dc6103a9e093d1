//! Ingestion orchestration for a verified, validated inbound email.
//!
//! Every write is an idempotent insert, so a redelivered or concurrently
//! delivered email converges on the same rows instead of failing.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::common::NewsletterId;
use crate::kernel::{BaseNewsletterStore, ServerDeps};

use super::email_parser;
use super::extraction::{InsightsOrigin, NewsletterExtractor, ParsedNewsletter};
use super::models::{CreateNewsletter, CreateNewsletterSource, InsertOutcome, NewsletterSource};
use super::payload::{InboundEmail, Route};

/// What happened to an email that passed the HTTP gates.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestionOutcome {
    /// Addressed to our own sender address.
    Loopback,
    /// Recipient outside the inbox domain.
    ForeignDomain { recipient: Option<String> },
    /// No user owns the recipient inbox.
    UserNotFound { recipient: String },
    Ingested {
        newsletter_id: NewsletterId,
        message_id: String,
        /// The newsletter was already stored before this delivery.
        duplicate: bool,
        origin: InsightsOrigin,
    },
}

pub async fn ingest_email(deps: &ServerDeps, email: &InboundEmail) -> Result<IngestionOutcome> {
    let recipient = match email.route(&deps.settings) {
        Route::Loopback => {
            info!(message_id = %email.message_id, "Ignoring email addressed to our own sender");
            return Ok(IngestionOutcome::Loopback);
        }
        Route::ForeignDomain(recipient) => {
            info!(
                message_id = %email.message_id,
                recipient = recipient.as_deref().unwrap_or("<none>"),
                "Ignoring email outside the inbox domain"
            );
            return Ok(IngestionOutcome::ForeignDomain { recipient });
        }
        Route::Deliver(recipient) => recipient,
    };

    let store = deps.store.as_ref();

    let Some(user) = store
        .find_user_by_inbox_email(&recipient)
        .await
        .context("Failed to look up recipient user")?
    else {
        info!(recipient = %recipient, "No user owns this inbox address");
        return Ok(IngestionOutcome::UserNotFound { recipient });
    };

    let sender_email = email.sender_email();
    let sender_name = email.sender_name();
    debug!(
        message_id = %email.message_id,
        sender = %sender_email,
        recipient = %recipient,
        "Processing inbound newsletter"
    );

    let parsed = NewsletterExtractor::from_deps(deps)
        .extract(
            &sender_email,
            email.body_html.as_deref(),
            email.body_text.as_deref(),
            &email.subject,
        )
        .await
        .context("Failed to extract newsletter content")?;

    let source = resolve_source(store, &sender_email, sender_name.as_deref(), &parsed).await?;
    let source_existed = !source.is_created();
    let source = source.into_inner();

    let newsletter = store
        .insert_newsletter(&new_newsletter(email, &source, &sender_email, sender_name, &parsed))
        .await
        .context("Failed to store newsletter")?;
    let newsletter_created = newsletter.is_created();
    let newsletter = newsletter.into_inner();

    store
        .link_user_source(user.id, source.id, &recipient)
        .await
        .context("Failed to link user to source")?;
    store
        .link_user_newsletter(user.id, newsletter.id)
        .await
        .context("Failed to link user to newsletter")?;

    let limit = deps.settings.source_update_limit;
    if source_existed && newsletter_created && !source.is_frozen(limit) {
        let refreshed = store
            .refresh_source_profile(source.id, &parsed.publisher, limit)
            .await
            .context("Failed to refresh source profile")?;
        debug!(
            source_id = %refreshed.id,
            update_count = refreshed.update_count,
            "Source profile refreshed"
        );
    } else {
        store
            .touch_source_stats(source.id)
            .await
            .context("Failed to update source statistics")?;
    }

    if newsletter_created {
        info!(
            newsletter_id = %newsletter.id,
            message_id = %email.message_id,
            source = %source.email,
            origin = ?parsed.origin,
            "Newsletter processed successfully"
        );
    } else {
        info!(
            newsletter_id = %newsletter.id,
            message_id = %email.message_id,
            "Newsletter already processed, linked existing row"
        );
    }

    Ok(IngestionOutcome::Ingested {
        newsletter_id: newsletter.id,
        message_id: email.message_id.clone(),
        duplicate: !newsletter_created,
        origin: parsed.origin,
    })
}

/// Find the source for `sender_email`, creating it on first contact.
///
/// New sources take their name from the sender display name, else the
/// address local part, else the address itself.
pub async fn resolve_source(
    store: &dyn BaseNewsletterStore,
    sender_email: &str,
    sender_name: Option<&str>,
    parsed: &ParsedNewsletter,
) -> Result<InsertOutcome<NewsletterSource>> {
    if let Some(source) = store
        .find_source_by_email(sender_email)
        .await
        .context("Failed to look up newsletter source")?
    {
        return Ok(InsertOutcome::Duplicate(source));
    }

    let name = sender_name
        .map(str::to_string)
        .or_else(|| email_parser::extract_local_part(sender_email))
        .unwrap_or_else(|| sender_email.to_string());
    let domain = email_parser::extract_sender_domain(sender_email).unwrap_or_default();

    let outcome = store
        .create_source(
            &CreateNewsletterSource::builder()
                .email(sender_email)
                .name(name)
                .domain(domain)
                .profile(parsed.publisher.clone())
                .build(),
        )
        .await
        .context("Failed to create newsletter source")?;

    if outcome.is_created() {
        info!(source_id = %outcome.get().id, email = %sender_email, "Created newsletter source");
    }
    Ok(outcome)
}

fn new_newsletter(
    email: &InboundEmail,
    source: &NewsletterSource,
    sender_email: &str,
    sender_name: Option<String>,
    parsed: &ParsedNewsletter,
) -> CreateNewsletter {
    CreateNewsletter::builder()
        .source_id(source.id)
        .newsletter_hash(parsed.newsletter_hash.clone())
        .message_id(email.message_id.clone())
        .subject(email.subject.clone())
        .sender_email(sender_email)
        .sender_name(sender_name)
        .html_content(parsed.sanitized_html.clone())
        .text_content(email.body_text.clone())
        .extracted_content(parsed.extracted_content.clone())
        .excerpt(parsed.excerpt.clone())
        .thumbnail_url(parsed.thumbnail_url.clone())
        .original_url(parsed.original_url.clone())
        .read_time_minutes(parsed.read_time_minutes)
        .tags(parsed.tags.clone())
        .category(parsed.category.clone())
        .headers(email.headers.clone())
        .attachments(email.attachment_metadata())
        .received_at(email.received_at)
        .build()
}
