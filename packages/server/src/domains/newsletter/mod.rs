//! Inbound newsletter ingestion.
//!
//! webhook (HTTP gates) → ingest (orchestration) → extraction (heuristics +
//! AI enrichment) → models (persistence through `BaseNewsletterStore`).

pub mod email_parser;
pub mod extraction;
pub mod ingest;
pub mod insights;
pub mod models;
pub mod payload;
pub mod signature;
pub mod webhook;

pub use extraction::{InsightsOrigin, NewsletterExtractor, ParsedNewsletter};
pub use ingest::{ingest_email, IngestionOutcome};
pub use insights::{NewsletterInsights, PublisherInsights, PublisherProfile, Region};
pub use payload::{InboundEmail, Route};
pub use webhook::{router, WebhookState};
