//! Newsletter fingerprint tests: the hash is taken over the extracted text,
//! so markup layout must not change it but wording must.

use lettertree_core::common::utils::generate_newsletter_hash;
use lettertree_core::domains::newsletter::email_parser::html_to_text;

fn html_hash(html: &str) -> String {
    generate_newsletter_hash(&html_to_text(html))
}

#[test]
fn identical_text_produces_same_hash() {
    let text = "This week: three startups raised seed rounds.";

    assert_eq!(generate_newsletter_hash(text), generate_newsletter_hash(text));
}

#[test]
fn html_whitespace_differences_ignored() {
    let compact = "<html><body><h1>Weekly Brief</h1><p>Three startups raised seed rounds.</p></body></html>";
    let indented = r#"
        <html>
          <body>
            <h1>
              Weekly Brief
            </h1>
            <p>Three   startups raised
               seed rounds.</p>
          </body>
        </html>
    "#;

    assert_eq!(html_hash(compact), html_hash(indented));
}

#[test]
fn markup_outside_text_ignored() {
    let plain = "<p>Three startups raised seed rounds.</p>";
    let styled = r#"<style>p { color: red; }</style>
        <p class="lead" style="font-size:18px">Three startups raised seed rounds.</p>"#;

    assert_eq!(html_hash(plain), html_hash(styled));
}

#[test]
fn wording_changes_produce_different_hash() {
    let original = html_hash("<p>Three startups raised seed rounds.</p>");

    assert_ne!(original, html_hash("<p>Four startups raised seed rounds.</p>"));
    assert_ne!(original, html_hash("<p>three startups raised seed rounds.</p>"));
    assert_ne!(original, html_hash("<p>Three startups raised seed rounds!</p>"));
}

#[test]
fn hash_is_lowercase_sha256_hex() {
    let hash = generate_newsletter_hash("Weekly Brief");

    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}
