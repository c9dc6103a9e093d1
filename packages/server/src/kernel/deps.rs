//! Server dependencies for the ingestion pipeline (using traits for testability)
//!
//! Built once at startup and handed to handlers through axum `State`.

use std::sync::Arc;

use crate::config::IngestSettings;
use crate::kernel::{BaseNewsletterAnalyzer, BaseNewsletterStore};

/// Server dependencies accessible to handlers
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn BaseNewsletterStore>,
    /// AI enrichment. Without it extraction is heuristic-only.
    pub analyzer: Option<Arc<dyn BaseNewsletterAnalyzer>>,
    pub settings: IngestSettings,
    /// HMAC secret shared with the email worker
    pub webhook_secret: Option<String>,
}

impl ServerDeps {
    pub fn new(
        store: Arc<dyn BaseNewsletterStore>,
        analyzer: Option<Arc<dyn BaseNewsletterAnalyzer>>,
        settings: IngestSettings,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            store,
            analyzer,
            settings,
            webhook_secret,
        }
    }
}
