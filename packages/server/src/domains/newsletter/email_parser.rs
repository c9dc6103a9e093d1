//! Email parsing utilities for newsletter ingestion.
//!
//! Pure, synchronous heuristics over an email body: sanitization, plain-text
//! derivation, excerpt, reading time, thumbnail and "read more" link
//! detection, and keyword-based categorization. None of these fail; malformed
//! HTML degrades to empty strings or `None`.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Maximum excerpt length, in characters.
pub const EXCERPT_CHARS: usize = 200;

/// Maximum number of heuristic tags.
pub const MAX_TAGS: usize = 10;

/// Images narrower than this are treated as spacers, icons or tracking pixels.
const MIN_THUMBNAIL_WIDTH: u32 = 200;

/// Anchor texts that usually point at the web version of an issue, in priority order.
const READ_MORE_PHRASES: &[&str] = &[
    "Read more",
    "Read More",
    "Continue reading",
    "View in browser",
    "Read the full",
    "Read article",
    "Full article",
    "원문 보기",
    "원문보기",
    "자세히 보기",
    "더 보기",
    "웹에서 보기",
];

/// CTA classes checked after the phrases.
const CTA_SELECTORS: &[&str] = &["a.primary-button", "a.main-cta", "a.read-more"];

/// Tag names whose text never reaches the reader.
const NON_TEXT_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Presentation attributes kept by the sanitizer; thumbnail detection reads them.
const LAYOUT_ATTRIBUTES: &[&str] = &[
    "style",
    "class",
    "width",
    "height",
    "align",
    "valign",
    "bgcolor",
    "border",
    "cellpadding",
    "cellspacing",
];

const TECH_TAGS: &[&str] = &[
    "javascript",
    "typescript",
    "react",
    "vue",
    "angular",
    "nodejs",
    "python",
    "rust",
    "go",
    "java",
    "kubernetes",
    "docker",
    "aws",
    "azure",
    "gcp",
];

lazy_static! {
    static ref IMG: Selector = Selector::parse("img").unwrap();
    static ref ANCHOR: Selector = Selector::parse("a[href]").unwrap();
    static ref CTA: Vec<Selector> = CTA_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect();
    static ref MAX_WIDTH_STYLE: Regex = Regex::new(r"(?i)max-width:\s*(\d+)px").unwrap();
    static ref LEADING_DIGITS: Regex = Regex::new(r"^\s*(\d+)").unwrap();
    static ref ZERO_WIDTH: Regex = Regex::new("[\u{200B}-\u{200D}\u{FEFF}]").unwrap();
    static ref REPEATED_SPACES: Regex = Regex::new(r" {2,}").unwrap();
    static ref HASHTAG: Regex = Regex::new(r"#([a-z0-9]+)").unwrap();
    static ref SOCIAL_OR_UNSUBSCRIBE: Regex =
        Regex::new(r"(?i)twitter|facebook|linkedin|instagram|unsubscribe").unwrap();
    static ref TECH_TAG_PATTERNS: Vec<(&'static str, Regex)> = TECH_TAGS
        .iter()
        .filter_map(|tag| {
            Regex::new(&format!(r"\b{}\b", regex::escape(tag)))
                .ok()
                .map(|re| (*tag, re))
        })
        .collect();
}

// =============================================================================
// Categories
// =============================================================================

/// Heuristic newsletter category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Tech,
    Business,
    News,
    Design,
    Marketing,
    Productivity,
    Science,
    Health,
}

impl Category {
    /// Scoring order; earlier categories win ties.
    pub const ALL: [Category; 8] = [
        Category::Tech,
        Category::Business,
        Category::News,
        Category::Design,
        Category::Marketing,
        Category::Productivity,
        Category::Science,
        Category::Health,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tech => "TECH",
            Category::Business => "BUSINESS",
            Category::News => "NEWS",
            Category::Design => "DESIGN",
            Category::Marketing => "MARKETING",
            Category::Productivity => "PRODUCTIVITY",
            Category::Science => "SCIENCE",
            Category::Health => "HEALTH",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Category::Tech => &[
                "technology",
                "software",
                "programming",
                "developer",
                "code",
                "api",
                "framework",
                "javascript",
                "python",
                "react",
                "ai",
                "machine learning",
                "crypto",
                "blockchain",
            ],
            Category::Business => &[
                "business",
                "startup",
                "entrepreneur",
                "investor",
                "funding",
                "venture",
                "market",
                "stock",
                "finance",
                "economy",
                "revenue",
                "profit",
            ],
            Category::News => &[
                "breaking",
                "news",
                "update",
                "report",
                "headline",
                "today",
                "latest",
                "current",
                "happening",
            ],
            Category::Design => &[
                "design",
                "ux",
                "ui",
                "user experience",
                "interface",
                "figma",
                "sketch",
                "typography",
                "color",
                "layout",
            ],
            Category::Marketing => &[
                "marketing",
                "seo",
                "growth",
                "conversion",
                "campaign",
                "advertising",
                "brand",
                "social media",
                "content marketing",
            ],
            Category::Productivity => &[
                "productivity",
                "tips",
                "workflow",
                "efficiency",
                "time management",
                "tools",
                "apps",
                "organization",
            ],
            Category::Science => &[
                "science",
                "research",
                "study",
                "experiment",
                "discovery",
                "biology",
                "physics",
                "chemistry",
                "space",
                "nasa",
            ],
            Category::Health => &[
                "health",
                "fitness",
                "wellness",
                "medical",
                "doctor",
                "patient",
                "treatment",
                "disease",
                "mental health",
                "nutrition",
            ],
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sender helpers
// =============================================================================

/// Extract the sender's domain from an email address.
/// e.g., "newsletter@example.org" → "example.org"
pub fn extract_sender_domain(from: &str) -> Option<String> {
    let email = bare_address(from)?;
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.to_lowercase())
        .filter(|d| !d.is_empty())
}

/// Local part of an address: "weekly@example.org" → "weekly".
pub fn extract_local_part(from: &str) -> Option<String> {
    let email = bare_address(from)?;
    email
        .split_once('@')
        .map(|(local, _)| local.to_string())
        .filter(|l| !l.is_empty())
}

/// Display name from a `"Name <addr>"` header value, quotes removed.
pub fn display_name_from_header(from: &str) -> Option<String> {
    let (name, _) = from.split_once('<')?;
    let name = name.trim().trim_matches('"').trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Bare address from "Name <email@domain.com>" or plain "email@domain.com".
pub fn extract_address(from: &str) -> Option<String> {
    bare_address(from).map(str::to_string)
}

fn bare_address(from: &str) -> Option<&str> {
    let email = if let Some(start) = from.find('<') {
        let end = from[start..].find('>')? + start;
        &from[start + 1..end]
    } else {
        from
    };
    let email = email.trim();
    (!email.is_empty()).then_some(email)
}

// =============================================================================
// Body processing
// =============================================================================

/// Strip executable content (scripts, styles, event handlers, `javascript:`
/// URLs) while keeping the layout attributes newsletters rely on.
pub fn sanitize_html(html: &str) -> String {
    ammonia::Builder::default()
        .add_generic_attributes(LAYOUT_ATTRIBUTES)
        .clean(html)
        .to_string()
}

/// Visible text of an HTML document with whitespace collapsed.
///
/// Every element boundary acts as a word break, so `<td>a</td><td>b</td>`
/// yields `"a b"`. Entities are decoded by the parser.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut chunks: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| NON_TEXT_TAGS.contains(&el.name()))
                .unwrap_or(false)
        });
        if !hidden {
            chunks.push(text);
        }
    }

    chunks
        .iter()
        .flat_map(|chunk| chunk.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// First `EXCERPT_CHARS` characters of the text, zero-width characters
/// removed and space runs collapsed.
pub fn generate_excerpt(text: &str) -> String {
    let cleaned = ZERO_WIDTH.replace_all(text, "");
    let collapsed = REPEATED_SPACES.replace_all(&cleaned, " ");
    collapsed.trim().chars().take(EXCERPT_CHARS).collect()
}

/// Whole minutes to read `text` at `words_per_minute`, at least 1.
pub fn calculate_reading_time(text: &str, words_per_minute: usize) -> i32 {
    let words = text.split_whitespace().count();
    let minutes = words.div_ceil(words_per_minute.max(1));
    i32::try_from(minutes.max(1)).unwrap_or(i32::MAX)
}

/// Pick a representative image.
///
/// The first image whose `width` attribute or inline `max-width` is at least
/// 200px wins. Otherwise the middle image is used, since tracking pixels and
/// logos tend to sit at the start and end of a message.
pub fn extract_thumbnail_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let images: Vec<ElementRef> = document.select(&IMG).collect();

    if images.is_empty() {
        return None;
    }

    for img in &images {
        let Some(src) = img.value().attr("src").map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };

        if effective_width(img) >= MIN_THUMBNAIL_WIDTH {
            return Some(src.to_string());
        }
    }

    images[images.len() / 2]
        .value()
        .attr("src")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn effective_width(img: &ElementRef) -> u32 {
    let attr_width = img
        .value()
        .attr("width")
        .and_then(|w| LEADING_DIGITS.captures(w))
        .and_then(|c| c[1].parse::<u32>().ok())
        .unwrap_or(0);

    let style_width = img
        .value()
        .attr("style")
        .and_then(|s| MAX_WIDTH_STYLE.captures(s))
        .and_then(|c| c[1].parse::<u32>().ok())
        .unwrap_or(0);

    attr_width.max(style_width)
}

/// Find the link to the web version of the newsletter.
///
/// Each "read more" phrase, then each CTA class, is tried in priority order;
/// only the first anchor matching a pattern is considered and it wins if its
/// href is an absolute http(s) URL. Failing that, the first absolute link
/// that is not a social or unsubscribe link and has more than one character
/// of text is used.
pub fn extract_original_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let anchors: Vec<ElementRef> = document.select(&ANCHOR).collect();

    for phrase in READ_MORE_PHRASES {
        let first = anchors
            .iter()
            .find(|a| a.text().collect::<String>().contains(phrase));
        if let Some(url) = first.and_then(|a| absolute_http_href(a)) {
            return Some(url);
        }
    }

    for selector in CTA.iter() {
        if let Some(url) = document
            .select(selector)
            .next()
            .and_then(|a| absolute_http_href(&a))
        {
            return Some(url);
        }
    }

    anchors.iter().find_map(|a| {
        let href = absolute_http_href(a)?;
        if SOCIAL_OR_UNSUBSCRIBE.is_match(&href) {
            return None;
        }
        let text = a.text().collect::<String>();
        (text.trim().chars().count() > 1).then_some(href)
    })
}

fn absolute_http_href(anchor: &ElementRef) -> Option<String> {
    let href = anchor.value().attr("href")?.trim();
    let url = Url::parse(href).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| href.to_string())
}

/// Keyword-score `subject + content`; `None` when nothing matches.
pub fn categorize_newsletter(content: &str, subject: &str) -> Option<Category> {
    let text = format!("{} {}", subject, content).to_lowercase();

    let mut best: Option<(Category, usize)> = None;
    for category in Category::ALL {
        let score = category
            .keywords()
            .iter()
            .filter(|keyword| text.contains(*keyword))
            .count();

        // Strictly greater keeps the earlier category on ties.
        if score > best.map(|(_, s)| s).unwrap_or(0) {
            best = Some((category, score));
        }
    }

    best.map(|(category, _)| category)
}

/// Known technology terms (whole words) followed by `#hashtags`,
/// deduplicated in discovery order and capped at `MAX_TAGS`.
pub fn extract_tags(content: &str, subject: &str) -> Vec<String> {
    let text = format!("{} {}", subject, content).to_lowercase();

    let mut seen = HashSet::new();
    let mut tags = Vec::new();

    let whitelist = TECH_TAG_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(&text))
        .map(|(tag, _)| tag.to_string());
    let hashtags = HASHTAG.captures_iter(&text).map(|c| c[1].to_string());

    for tag in whitelist.chain(hashtags) {
        if tags.len() == MAX_TAGS {
            break;
        }
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_sender_domain() {
        assert_eq!(
            extract_sender_domain("news@Example.org"),
            Some("example.org".to_string())
        );
        assert_eq!(
            extract_sender_domain("Weekly <hello@mail.example.org>"),
            Some("mail.example.org".to_string())
        );
        assert_eq!(extract_sender_domain("no-at-sign"), None);
    }

    #[test]
    fn test_local_part_and_display_name() {
        assert_eq!(extract_local_part("weekly@example.org"), Some("weekly".to_string()));
        assert_eq!(
            display_name_from_header("\"Morning Brew\" <crew@morningbrew.com>"),
            Some("Morning Brew".to_string())
        );
        assert_eq!(display_name_from_header("crew@morningbrew.com"), None);
    }

    #[test]
    fn test_sanitize_strips_scripts_and_handlers() {
        let html = r#"<div class="hero" onclick="steal()"><script>alert(1)</script><img src="https://cdn.example.org/a.png" width="600" onerror="x()"><a href="javascript:alert(1)">x</a></div>"#;
        let clean = sanitize_html(html);

        assert!(!clean.contains("<script"));
        assert!(!clean.contains("alert(1)"));
        assert!(!clean.contains("onclick"));
        assert!(!clean.contains("onerror"));
        assert!(!clean.contains("javascript:"));
        assert!(clean.contains(r#"width="600""#));
        assert!(clean.contains(r#"class="hero""#));
    }

    #[test]
    fn test_html_to_text_skips_style_and_decodes_entities() {
        let html = "<html><head><style>p { color: red; }</style></head>\
                    <body><p>Fish &amp; chips</p><p>are&nbsp;great</p>\
                    <script>var x = 1;</script></body></html>";
        assert_eq!(html_to_text(html), "Fish & chips are great");
    }

    #[test]
    fn test_html_to_text_breaks_words_at_cells() {
        assert_eq!(html_to_text("<table><tr><td>one</td><td>two</td></tr></table>"), "one two");
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn test_excerpt_removes_zero_width_and_truncates_chars() {
        let text = format!("Hello\u{200B} \u{FEFF} world {}", "가".repeat(300));
        let excerpt = generate_excerpt(&text);

        assert!(excerpt.starts_with("Hello world "));
        assert_eq!(excerpt.chars().count(), EXCERPT_CHARS);
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(calculate_reading_time("", 400), 1);
        assert_eq!(calculate_reading_time(&"word ".repeat(400), 400), 1);
        assert_eq!(calculate_reading_time(&"word ".repeat(401), 400), 2);
        assert_eq!(calculate_reading_time(&"word ".repeat(1200), 400), 3);
    }

    #[test]
    fn test_thumbnail_prefers_wide_image() {
        let html = r#"
            <img src="https://cdn.example.org/logo.png" width="120">
            <img src="https://cdn.example.org/hero.png" width="300">
            <img src="https://cdn.example.org/pixel.gif" width="1">
        "#;
        assert_eq!(
            extract_thumbnail_url(html),
            Some("https://cdn.example.org/hero.png".to_string())
        );
    }

    #[test]
    fn test_thumbnail_reads_max_width_style() {
        let html = r#"<img src="a.png"><img src="b.png" style="display:block; max-width: 560px">"#;
        assert_eq!(extract_thumbnail_url(html), Some("b.png".to_string()));
    }

    #[test]
    fn test_thumbnail_falls_back_to_middle_image() {
        let html = r#"<img src="1.png"><img src="2.png"><img src="3.png"><img src="4.png">"#;
        assert_eq!(extract_thumbnail_url(html), Some("3.png".to_string()));
        assert_eq!(extract_thumbnail_url("<p>no images</p>"), None);
    }

    #[test]
    fn test_original_url_phrase_priority() {
        let html = r#"
            <a href="https://example.org/browser">View in browser</a>
            <a href="https://example.org/story">Read more</a>
        "#;
        assert_eq!(
            extract_original_url(html),
            Some("https://example.org/story".to_string())
        );
    }

    #[test]
    fn test_original_url_korean_phrase_and_cta() {
        let korean = r#"<a href="https://news.example.kr/1">원문 보기</a>"#;
        assert_eq!(
            extract_original_url(korean),
            Some("https://news.example.kr/1".to_string())
        );

        let cta = r#"<a href="https://example.org/cta" class="main-cta">Go</a>"#;
        assert_eq!(extract_original_url(cta), Some("https://example.org/cta".to_string()));
    }

    #[test]
    fn test_original_url_fallback_skips_social_and_relative() {
        let html = r#"
            <a href="/relative">Relative link</a>
            <a href="https://twitter.com/example">Follow us</a>
            <a href="https://example.org/x">x</a>
            <a href="https://example.org/unsubscribe?u=1">Unsubscribe here</a>
            <a href="https://example.org/post">The big story</a>
        "#;
        assert_eq!(
            extract_original_url(html),
            Some("https://example.org/post".to_string())
        );
        assert_eq!(extract_original_url("<p>nothing</p>"), None);
    }

    #[test]
    fn test_categorize_business() {
        let category = categorize_newsletter(
            "This week a startup closed new funding from a venture fund.",
            "Weekly briefing",
        );
        assert_eq!(category, Some(Category::Business));
    }

    #[test]
    fn test_categorize_tie_goes_to_earlier_category() {
        // one TECH keyword ("software"), one HEALTH keyword ("fitness")
        let category = categorize_newsletter("software fitness", "");
        assert_eq!(category, Some(Category::Tech));
        assert_eq!(categorize_newsletter("zzz", "qqq"), None);
    }

    #[test]
    fn test_tags_whole_words_and_hashtags() {
        let tags = extract_tags("Shipping Rust and TypeScript. #WeeklyDigest #rust", "JavaScript tips");

        assert_eq!(tags, vec!["javascript", "typescript", "rust", "weeklydigest"]);
    }

    #[test]
    fn test_tags_capped_and_unique() {
        let hashtags: String = (0..20).map(|i| format!("#tag{} #tag{} ", i, i)).collect();
        let tags = extract_tags(&hashtags, "");

        assert_eq!(tags.len(), MAX_TAGS);
        let unique: HashSet<_> = tags.iter().collect();
        assert_eq!(unique.len(), tags.len());
    }
}
