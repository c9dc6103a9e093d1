//! Pure Google Gemini REST API client
//!
//! A small client for the Generative Language API with no domain-specific
//! logic. Supports plain `generateContent` calls and schema-driven
//! structured output.
//!
//! # Type-Safe Structured Output
//!
//! ```rust,ignore
//! use gemini_client::GeminiClient;
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct Summary {
//!     headline: String,
//! }
//!
//! let client = GeminiClient::from_env()?;
//! let summary: Summary = client
//!     .extract("gemini-2.5-flash", "Summarize the email", ["<html>...</html>"])
//!     .await?;
//! ```

pub mod error;
pub mod schema;
pub mod types;

pub use error::{GeminiError, Result};
pub use schema::StructuredOutput;
pub use types::*;

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Pure Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a new Gemini client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from environment variable `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| GeminiError::Config("GEMINI_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }

    /// Set a custom base URL (for proxies, test servers, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Bound every request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeminiError::Config(e.to_string()))?;
        Ok(self)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Raw `generateContent` call.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Gemini request failed");
                GeminiError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Gemini API error");
            return Err(GeminiError::Api(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GeminiError::Parse(e.to_string()))?;

        debug!(
            model = %model,
            duration_ms = start.elapsed().as_millis(),
            total_tokens = body
                .usage_metadata
                .as_ref()
                .map(|u| u.total_token_count)
                .unwrap_or_default(),
            "Gemini generate content"
        );

        Ok(body)
    }

    /// Type-safe structured output extraction.
    ///
    /// Generates a response schema from `T` with `schemars`, asks the model
    /// for `application/json`, and deserializes the answer.
    pub async fn extract<T, I, S>(
        &self,
        model: &str,
        system_prompt: impl Into<String>,
        user_parts: I,
    ) -> Result<T>
    where
        T: StructuredOutput,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schema = T::gemini_schema();

        debug!(
            type_name = T::type_name(),
            schema = %serde_json::to_string(&schema).unwrap_or_default(),
            "Generated Gemini schema for extraction"
        );

        let request = GenerateContentRequest::user(user_parts)
            .system(system_prompt)
            .json_schema(schema);
        let response = self.generate_content(model, &request).await?;

        let text = response
            .text()
            .ok_or_else(|| GeminiError::Blocked(response.block_reason()))?;

        serde_json::from_str(&text)
            .map_err(|e| GeminiError::Parse(format!("Failed to deserialize response: {}", e)))
    }
}
