// AI implementation using Gemini
//
// This is the infrastructure implementation of BaseNewsletterAnalyzer.
// What to ask for (prompt and response shape) lives in domains::newsletter::insights.

use anyhow::{Context, Result};
use async_trait::async_trait;
use gemini_client::GeminiClient;

use super::BaseNewsletterAnalyzer;
use crate::domains::newsletter::insights::{NewsletterInsights, ANALYSIS_PROMPT};

/// Default model for newsletter analysis.
pub const GEMINI_2_5_FLASH: &str = "gemini-2.5-flash";

#[derive(Clone)]
pub struct GeminiNewsletterAnalyzer {
    client: GeminiClient,
    model: String,
}

impl GeminiNewsletterAnalyzer {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl BaseNewsletterAnalyzer for GeminiNewsletterAnalyzer {
    async fn analyze(&self, html: &str) -> Result<NewsletterInsights> {
        self.client
            .extract::<NewsletterInsights, _, _>(&self.model, ANALYSIS_PROMPT, [html])
            .await
            .with_context(|| format!("Gemini analysis with {} failed", self.model))
    }
}
