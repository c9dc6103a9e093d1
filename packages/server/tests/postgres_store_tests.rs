//! Postgres store tests: idempotent inserts, the refresh limit and counter
//! reconciliation, run against a real database.

mod common;

use chrono::Utc;
use common::*;
use lettertree_core::common::utils::generate_newsletter_hash;
use lettertree_core::domains::newsletter::insights::PublisherProfile;
use lettertree_core::domains::newsletter::models::{
    CreateNewsletter, CreateNewsletterSource, NewsletterSource,
};
use lettertree_core::kernel::BaseNewsletterStore;
use test_context::test_context;

fn source_input(email: &str) -> CreateNewsletterSource {
    CreateNewsletterSource::builder()
        .email(email)
        .name("The Brief")
        .domain("example.org")
        .profile(PublisherProfile {
            description: Some("Original".into()),
            category: Some("TECH".into()),
            ..Default::default()
        })
        .build()
}

fn newsletter_input(source: &NewsletterSource, body: &str) -> CreateNewsletter {
    CreateNewsletter::builder()
        .source_id(source.id)
        .newsletter_hash(generate_newsletter_hash(body))
        .message_id(format!("<{}@mail.example.org>", uuid::Uuid::new_v4()))
        .subject("Weekly")
        .sender_email(source.email.clone())
        .extracted_content(body)
        .tags(vec!["rust".to_string()])
        .received_at(Utc::now())
        .build()
}

#[test_context(PostgresHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn source_insert_is_idempotent(ctx: &PostgresHarness) {
    let email = unique_email("brief");

    let first = ctx.store.create_source(&source_input(&email)).await.unwrap();
    let second = ctx.store.create_source(&source_input(&email)).await.unwrap();

    assert!(first.is_created());
    assert!(!second.is_created());
    assert_eq!(first.get().id, second.get().id);

    let source = first.into_inner();
    assert_eq!(source.region, "ROW");
    assert_eq!(source.update_count, 0);
    assert_eq!(source.description.as_deref(), Some("Original"));
}

#[test_context(PostgresHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn newsletter_and_links_are_idempotent(ctx: &PostgresHarness) {
    let (user, inbox) = ctx.create_user().await.unwrap();
    let source = ctx
        .store
        .create_source(&source_input(&unique_email("brief")))
        .await
        .unwrap()
        .into_inner();
    let body = format!("Issue {}", uuid::Uuid::new_v4());

    let first = ctx
        .store
        .insert_newsletter(&newsletter_input(&source, &body))
        .await
        .unwrap();
    // Redelivery gets a new message id but the same content hash.
    let second = ctx
        .store
        .insert_newsletter(&newsletter_input(&source, &body))
        .await
        .unwrap();
    assert!(first.is_created());
    assert!(!second.is_created());
    assert_eq!(first.get().id, second.get().id);
    assert_eq!(first.get().tags.0, vec!["rust"]);

    let newsletter_id = first.get().id;
    assert!(ctx
        .store
        .link_user_newsletter(user.id, newsletter_id)
        .await
        .unwrap()
        .is_created());
    assert!(!ctx
        .store
        .link_user_newsletter(user.id, newsletter_id)
        .await
        .unwrap()
        .is_created());

    let link = ctx
        .store
        .link_user_source(user.id, source.id, &inbox)
        .await
        .unwrap();
    assert!(link.is_created());
    assert!(link.get().is_subscribed);
    assert_eq!(link.get().subscription_email.as_deref(), Some(inbox.as_str()));
    assert!(!ctx
        .store
        .link_user_source(user.id, source.id, &inbox)
        .await
        .unwrap()
        .is_created());

    let found = ctx
        .store
        .find_user_by_inbox_email(&inbox)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, user.id);
}

#[test_context(PostgresHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn refresh_stops_at_limit(ctx: &PostgresHarness) {
    let (user, inbox) = ctx.create_user().await.unwrap();
    let source = ctx
        .store
        .create_source(&source_input(&unique_email("brief")))
        .await
        .unwrap()
        .into_inner();
    ctx.store
        .insert_newsletter(&newsletter_input(&source, &format!("Issue {}", uuid::Uuid::new_v4())))
        .await
        .unwrap();
    ctx.store
        .link_user_source(user.id, source.id, &inbox)
        .await
        .unwrap();

    let profile = |description: &str| PublisherProfile {
        description: Some(description.to_string()),
        ..Default::default()
    };

    let once = ctx
        .store
        .refresh_source_profile(source.id, &profile("First"), 2)
        .await
        .unwrap();
    assert_eq!(once.update_count, 1);
    assert_eq!(once.description.as_deref(), Some("First"));
    // Absent fields keep their stored values.
    assert_eq!(once.category.as_deref(), Some("TECH"));
    assert_eq!(once.subscriber_count, 1);
    assert_eq!(once.total_newsletters, 1);
    assert!(once.last_newsletter_at.is_some());

    let twice = ctx
        .store
        .refresh_source_profile(source.id, &profile("Second"), 2)
        .await
        .unwrap();
    assert_eq!(twice.update_count, 2);
    assert_eq!(twice.description.as_deref(), Some("Second"));

    let frozen = ctx
        .store
        .refresh_source_profile(source.id, &profile("Third"), 2)
        .await
        .unwrap();
    assert_eq!(frozen.update_count, 2);
    assert_eq!(frozen.description.as_deref(), Some("Second"));
    assert!(frozen.last_newsletter_at >= twice.last_newsletter_at);
}

#[test_context(PostgresHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn touch_stats_recounts_without_profile_changes(ctx: &PostgresHarness) {
    let (user, inbox) = ctx.create_user().await.unwrap();
    let source = ctx
        .store
        .create_source(&source_input(&unique_email("brief")))
        .await
        .unwrap()
        .into_inner();
    for _ in 0..2 {
        ctx.store
            .insert_newsletter(&newsletter_input(&source, &format!("Issue {}", uuid::Uuid::new_v4())))
            .await
            .unwrap();
    }
    ctx.store
        .link_user_source(user.id, source.id, &inbox)
        .await
        .unwrap();

    let touched = ctx.store.touch_source_stats(source.id).await.unwrap();

    assert_eq!(touched.subscriber_count, 1);
    assert_eq!(touched.total_newsletters, 2);
    assert_eq!(touched.update_count, 0);
    assert_eq!(touched.description.as_deref(), Some("Original"));
    assert!(touched.last_newsletter_at.is_some());
}

#[test_context(PostgresHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn drifted_counters_are_reported_and_reconciled(ctx: &PostgresHarness) {
    let (user, inbox) = ctx.create_user().await.unwrap();
    let source = ctx
        .store
        .create_source(&source_input(&unique_email("brief")))
        .await
        .unwrap()
        .into_inner();
    ctx.store
        .insert_newsletter(&newsletter_input(&source, &format!("Issue {}", uuid::Uuid::new_v4())))
        .await
        .unwrap();
    ctx.store
        .link_user_source(user.id, source.id, &inbox)
        .await
        .unwrap();
    ctx.store.touch_source_stats(source.id).await.unwrap();

    sqlx::query("UPDATE newsletter_sources SET subscriber_count = 7, total_newsletters = 9 WHERE id = $1")
        .bind(source.id)
        .execute(&ctx.db_pool)
        .await
        .unwrap();

    let drift = NewsletterSource::find_count_drift(&ctx.db_pool).await.unwrap();
    let entry = drift.iter().find(|d| d.id == source.id).unwrap();
    assert_eq!(entry.subscriber_count, 7);
    assert_eq!(entry.actual_subscribers, 1);
    assert_eq!(entry.total_newsletters, 9);
    assert_eq!(entry.actual_newsletters, 1);

    let updated = NewsletterSource::reconcile_counts(&ctx.db_pool).await.unwrap();
    assert!(updated >= 1);

    let drift = NewsletterSource::find_count_drift(&ctx.db_pool).await.unwrap();
    assert!(drift.iter().all(|d| d.id != source.id));

    let fixed = ctx.store.find_source_by_id(source.id).await.unwrap().unwrap();
    assert_eq!(fixed.subscriber_count, 1);
    assert_eq!(fixed.total_newsletters, 1);
}
