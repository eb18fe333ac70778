// src/document.rs
//! Document source boundary: download a URL and normalize it into a
//! `NormalizedDocument`, or wrap caller-supplied raw text directly.
//!
//! Primary extraction walks the parsed DOM (`scraper`). When it yields fewer
//! than `MIN_PRIMARY_TEXT_CHARS` characters, a fallback plain-text extractor
//! strips markup from the whole page and its text is preferred only if it is
//! strictly longer than the primary result.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::FetchConfig;
use crate::error::EnrichError;

/// Below this many extracted chars the fallback extractor kicks in.
pub const MIN_PRIMARY_TEXT_CHARS: usize = 50;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub title: String,
    pub publish_date: Option<DateTime<Utc>>,
    pub raw_text: String,
    pub raw_html: String,
    /// Markup of the `<article>` subtree when the page has one, else the whole
    /// page. This is what renders to Markdown; `raw_html` keeps the full page
    /// for link scanning.
    pub content_html: String,
    pub authors: Vec<String>,
    pub top_image: Option<String>,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    /// Source URL when the document came from a fetch; `None` for raw text.
    pub source_url: Option<String>,
}

impl NormalizedDocument {
    /// Wrap raw caller text; no fetch, no markup.
    pub fn from_raw_text(text: &str) -> Self {
        Self {
            raw_text: text.trim().to_string(),
            ..Self::default()
        }
    }
}

/// Narrow seam to the fetch/parse engine so the pipeline and tests can run
/// against stubs.
#[async_trait::async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<NormalizedDocument, EnrichError>;
    fn name(&self) -> &'static str;
}

/// Production source: reqwest download + DOM extraction.
pub struct HttpDocumentSource {
    http: reqwest::Client,
}

impl HttpDocumentSource {
    pub fn new(cfg: &FetchConfig) -> Self {
        let redirects = if cfg.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .redirect(redirects)
            .build()
            .expect("reqwest client");
        Self { http }
    }
}

#[async_trait::async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn fetch(&self, url: &str) -> Result<NormalizedDocument, EnrichError> {
        let parsed = Url::parse(url).map_err(|e| EnrichError::fetch_failed(url, e))?;

        let resp = self
            .http
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| EnrichError::fetch_failed(url, e))?;

        if !resp.status().is_success() {
            return Err(EnrichError::fetch_failed(
                url,
                format!("HTTP status {}", resp.status()),
            ));
        }

        let html = resp
            .text()
            .await
            .map_err(|e| EnrichError::fetch_failed(url, e))?;

        Ok(normalize_html(&parsed, &html))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Parse the page and pull out text + metadata. Pure; no I/O.
pub fn normalize_html(base: &Url, html: &str) -> NormalizedDocument {
    let dom = Html::parse_document(html);

    let title = select_content(&dom, "meta[property=\"og:title\"]")
        .or_else(|| select_text(&dom, "title"))
        .unwrap_or_default();

    let publish_date = select_content(&dom, "meta[property=\"article:published_time\"]")
        .or_else(|| select_content(&dom, "meta[name=\"date\"]"))
        .and_then(|raw| parse_publish_date(&raw));

    let mut authors: Vec<String> = Vec::new();
    for sel in ["meta[name=\"author\"]", "meta[property=\"article:author\"]"] {
        for a in select_all_content(&dom, sel) {
            let a = a.trim().to_string();
            if !a.is_empty() && !authors.contains(&a) {
                authors.push(a);
            }
        }
    }

    let top_image =
        select_content(&dom, "meta[property=\"og:image\"]").and_then(|u| absolutize(base, &u));

    let mut images: Vec<String> = Vec::new();
    if let Ok(sel) = Selector::parse("img[src]") {
        for el in dom.select(&sel) {
            if let Some(src) = el.value().attr("src").and_then(|s| absolutize(base, s)) {
                if !images.contains(&src) {
                    images.push(src);
                }
            }
        }
    }

    let mut videos: Vec<String> = Vec::new();
    for sel in ["video source[src]", "video[src]", "iframe[src]"] {
        if let Ok(sel) = Selector::parse(sel) {
            for el in dom.select(&sel) {
                let Some(src) = el.value().attr("src").and_then(|s| absolutize(base, s)) else {
                    continue;
                };
                let is_embed = el.value().name() != "iframe"
                    || src.contains("youtube.")
                    || src.contains("youtu.be")
                    || src.contains("vimeo.");
                if is_embed && !videos.contains(&src) {
                    videos.push(src);
                }
            }
        }
    }

    // Primary text: <article> body if present, else all paragraphs.
    let mut raw_text = select_joined_text(&dom, "article p")
        .filter(|t| !t.is_empty())
        .or_else(|| select_joined_text(&dom, "p").filter(|t| !t.is_empty()))
        .unwrap_or_default();

    // The same subtree bounds the Markdown rendition, keeping nav/footer
    // boilerplate out of it.
    let content_html = select_fragment(&dom, "article").unwrap_or_else(|| html.to_string());

    if raw_text.chars().count() < MIN_PRIMARY_TEXT_CHARS {
        let fallback = fallback_plain_text(html);
        if fallback.chars().count() > raw_text.chars().count() {
            raw_text = fallback;
        }
    }

    NormalizedDocument {
        title,
        publish_date,
        raw_text,
        raw_html: html.to_string(),
        content_html,
        authors,
        top_image,
        images,
        videos,
        source_url: Some(base.to_string()),
    }
}

/// Strip script/style blocks and all remaining tags, unescape entities,
/// collapse whitespace. Last-resort extraction when the DOM walk finds nothing.
pub fn fallback_plain_text(html: &str) -> String {
    static RE_SCRIPT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("script regex"));
    static RE_STYLE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("style regex"));
    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

    let out = RE_SCRIPT.replace_all(html, " ");
    let out = RE_STYLE.replace_all(&out, " ");
    let out = RE_TAGS.replace_all(&out, " ");
    let out = html_escape::decode_html_entities(&out).to_string();
    RE_WS.replace_all(&out, " ").trim().to_string()
}

fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
        })
}

fn absolutize(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("data:") {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

fn select_content(dom: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    dom.select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn select_all_content(dom: &Html, selector: &str) -> Vec<String> {
    let Ok(sel) = Selector::parse(selector) else {
        return Vec::new();
    };
    dom.select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(|s| s.to_string())
        .collect()
}

fn select_fragment(dom: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    dom.select(&sel).next().map(|el| el.html())
}

fn select_text(dom: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    dom.select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn select_joined_text(dom: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let parts: Vec<String> = dom
        .select(&sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/story").expect("base url")
    }

    #[test]
    fn extracts_title_text_and_metadata() {
        let html = r#"<html><head>
            <title>Fallback Title</title>
            <meta property="og:title" content="Big Story">
            <meta name="author" content="Jane Roe">
            <meta property="article:published_time" content="2024-05-01T10:00:00Z">
            <meta property="og:image" content="/banner.jpg">
            </head><body>
            <article><p>First paragraph with enough words to count as body text.</p>
            <p>Second paragraph follows here.</p></article>
            <img src="/inline.png">
            </body></html>"#;
        let doc = normalize_html(&base(), html);
        assert_eq!(doc.title, "Big Story");
        assert_eq!(doc.authors, vec!["Jane Roe".to_string()]);
        assert!(doc.raw_text.starts_with("First paragraph"));
        assert!(doc.raw_text.contains("Second paragraph"));
        assert_eq!(doc.top_image.as_deref(), Some("https://example.com/banner.jpg"));
        assert_eq!(doc.images, vec!["https://example.com/inline.png".to_string()]);
        assert!(doc.publish_date.is_some());
    }

    #[test]
    fn content_html_is_the_article_subtree() {
        let html = "<html><body><nav>Site navigation</nav>\
                    <article><p>Body paragraph long enough to satisfy direct \
                    extraction of the text.</p></article>\
                    <footer>Footer boilerplate</footer></body></html>";
        let doc = normalize_html(&base(), html);
        assert!(doc.content_html.starts_with("<article"));
        assert!(doc.content_html.contains("Body paragraph"));
        assert!(!doc.content_html.contains("Site navigation"));
        assert!(!doc.content_html.contains("Footer boilerplate"));
        // The full page stays available separately.
        assert!(doc.raw_html.contains("Site navigation"));
    }

    #[test]
    fn content_html_falls_back_to_the_whole_page() {
        let html = "<html><body><p>No article element wraps this paragraph, \
                    but it is long enough on its own.</p></body></html>";
        let doc = normalize_html(&base(), html);
        assert_eq!(doc.content_html, html);
    }

    #[test]
    fn fallback_kicks_in_for_tag_soup() {
        // No <p> content at all; the fallback must still recover the text.
        let html = "<html><body><div>Plain division text that is definitely longer \
                    than fifty characters in total, promise.</div>\
                    <script>var x = 1;</script></body></html>";
        let doc = normalize_html(&base(), html);
        assert!(doc.raw_text.contains("Plain division text"));
        assert!(!doc.raw_text.contains("var x"));
    }

    #[test]
    fn fallback_is_only_preferred_when_strictly_longer() {
        // Primary extraction succeeds and is longer than anything the stripped
        // page could offer, so it must win.
        let html = "<html><body><p>Primary body that easily clears the fifty \
                    character minimum for direct extraction.</p></body></html>";
        let doc = normalize_html(&base(), html);
        assert!(doc.raw_text.starts_with("Primary body"));
    }

    #[test]
    fn fallback_plain_text_strips_and_unescapes() {
        let html = "<div>Tom &amp; Jerry <b>fight</b>\n\n  again</div><style>.x{}</style>";
        assert_eq!(fallback_plain_text(html), "Tom & Jerry fight again");
    }

    #[test]
    fn raw_text_document_is_markup_free() {
        let doc = NormalizedDocument::from_raw_text("  hello world  ");
        assert_eq!(doc.raw_text, "hello world");
        assert!(doc.raw_html.is_empty());
        assert!(doc.source_url.is_none());
    }
}
