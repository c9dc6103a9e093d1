//! Structured insights about a newsletter issue and its publisher.
//!
//! `NewsletterInsights` doubles as the structured-output schema sent to the
//! model, so field doc comments become schema descriptions.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Instruction sent with the sanitized HTML.
pub const ANALYSIS_PROMPT: &str = "\
You are given the HTML of one newsletter email.
Describe its publisher in `source`: a short description, the publisher logo image URL, \
the publisher's category, the publisher website URL, the region (KR for Korean publishers, \
ROW for everyone else) and the URL where readers can subscribe.
For the issue itself return the most representative thumbnail image URL, one upper-case \
category (for example AI, TECH, BUSINESS, STARTUP, DESIGN, MARKETING, PRODUCTIVITY), \
a list of fitting tags, and the link to the original web version of the issue.
Return only these fields. If a value cannot be determined from the email, leave it empty \
instead of guessing.";

/// Publisher region.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Region {
    KR,
    #[default]
    ROW,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::KR => "KR",
            Region::ROW => "ROW",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "KR" => Some(Region::KR),
            "ROW" => Some(Region::ROW),
            _ => None,
        }
    }
}

/// Model answer for one newsletter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterInsights {
    /// Absolute URL of the most representative image in the email
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// One upper-case category such as TECH or BUSINESS
    #[serde(default)]
    pub category: Option<String>,
    /// Absolute URL of the web version of this issue
    #[serde(default)]
    pub original_url: Option<String>,
    /// Short lower-case topic tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Information about the publisher
    #[serde(default)]
    pub source: PublisherInsights,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublisherInsights {
    /// One or two sentence description of the publisher
    #[serde(default)]
    pub description: Option<String>,
    /// Absolute URL of the publisher logo
    #[serde(default)]
    pub logo_url: Option<String>,
    /// Publisher category
    #[serde(default)]
    pub category: Option<String>,
    /// Publisher website URL
    #[serde(default)]
    pub website: Option<String>,
    /// KR for Korean publishers, ROW otherwise
    #[serde(default, deserialize_with = "lenient_region")]
    pub region: Option<Region>,
    /// URL where readers can subscribe
    #[serde(default)]
    pub subscribe_url: Option<String>,
}

/// Models answer "" for unknown enum values; treat anything unrecognized as absent.
fn lenient_region<'de, D>(deserializer: D) -> Result<Option<Region>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Region::parse))
}

/// Publisher fields as stored on a source, blanks normalized to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublisherProfile {
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub category: Option<String>,
    pub website: Option<String>,
    pub region: Option<Region>,
    pub subscribe_url: Option<String>,
}

impl PublisherProfile {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl From<PublisherInsights> for PublisherProfile {
    fn from(source: PublisherInsights) -> Self {
        Self {
            description: non_blank(source.description),
            logo_url: non_blank(source.logo_url),
            category: non_blank(source.category).map(|c| c.to_uppercase()),
            website: non_blank(source.website),
            region: source.region,
            subscribe_url: non_blank(source.subscribe_url),
        }
    }
}

/// `None` for missing or whitespace-only values, trimmed otherwise.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
