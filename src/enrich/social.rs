// src/enrich/social.rs
//! Social references: profile links found in the document, account handles
//! found in the text, and share counts fetched from a provider behind a trait
//! seam (real HTTP impl + disabled impl for tests/offline runs).

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::config::SOCIAL_PLATFORMS;

static PLATFORM_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let specs: &[(&str, &str)] = &[
        (
            "facebook",
            r"(?i)https?://(?:www\.)?facebook\.com/[A-Za-z0-9.\-_/]+",
        ),
        (
            "twitter",
            r"(?i)https?://(?:www\.)?(?:twitter|x)\.com/[A-Za-z0-9_]+",
        ),
        (
            "instagram",
            r"(?i)https?://(?:www\.)?instagram\.com/[A-Za-z0-9._]+",
        ),
        (
            "linkedin",
            r"(?i)https?://(?:[a-z]{2,3}\.)?linkedin\.com/(?:in|company)/[A-Za-z0-9\-_%]+",
        ),
        (
            "pinterest",
            r"(?i)https?://(?:www\.)?pinterest\.com/[A-Za-z0-9_\-]+",
        ),
        (
            "reddit",
            r"(?i)https?://(?:www\.)?reddit\.com/(?:r|u|user)/[A-Za-z0-9_\-]+",
        ),
    ];
    specs
        .iter()
        .map(|(p, re)| (*p, Regex::new(re).expect("valid platform regex")))
        .collect()
});

static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("email regex")
});
// The leading context class keeps e-mail local parts from matching as handles.
static RE_HANDLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[\s(])(@[A-Za-z][A-Za-z0-9_]{2,30})\b").expect("handle regex")
});

/// Share/intent widget URLs are links *to* the platform, not profiles. A
/// marker only counts when it ends a path segment, so profile slugs like
/// `/shareholders` survive.
fn is_share_widget(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    ["/sharer", "/share", "/intent"].iter().any(|marker| {
        lower.match_indices(marker).any(|(i, _)| {
            matches!(
                lower.as_bytes().get(i + marker.len()),
                None | Some(b'/') | Some(b'?') | Some(b'#')
            )
        })
    })
}

#[derive(Debug, Clone, Default)]
pub struct SocialExtractor;

impl SocialExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Distinct profile links per platform, scanned from the page markup and
    /// the source URL itself. Platforms with no matches are omitted.
    pub fn profile_links(&self, source_url: Option<&str>, html: &str) -> BTreeMap<String, Vec<String>> {
        let mut haystack = html.to_string();
        if let Some(u) = source_url {
            haystack.push(' ');
            haystack.push_str(u);
        }

        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (platform, re) in PLATFORM_PATTERNS.iter() {
            let mut matches: Vec<String> = Vec::new();
            for m in re.find_iter(&haystack) {
                let url = m.as_str().trim_end_matches('/').to_string();
                if is_share_widget(&url) {
                    continue;
                }
                if !matches.contains(&url) {
                    matches.push(url);
                }
            }
            if !matches.is_empty() {
                out.insert(platform.to_string(), matches);
            }
        }
        out
    }

    /// Account identifiers mentioned in the plain text: first e-mail address
    /// and first @-handle found.
    pub fn accounts(&self, text: &str) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if let Some(m) = RE_EMAIL.find(text) {
            out.insert("email".to_string(), m.as_str().to_string());
        }
        if let Some(m) = RE_HANDLE.captures(text).and_then(|c| c.get(1)) {
            out.insert("handle".to_string(), m.as_str().to_string());
        }
        out
    }
}

/// Seam to the share-count lookup service.
#[async_trait::async_trait]
pub trait ShareCountProvider: Send + Sync {
    /// Per-platform share counts for `url`. Platforms the provider cannot
    /// answer for are reported as 0.
    async fn fetch(&self, url: &str) -> Result<BTreeMap<String, i64>>;
    fn name(&self) -> &'static str;
}

/// Best-effort HTTP provider. Only Reddit exposes an unauthenticated lookup;
/// other platforms report 0 rather than failing the task.
pub struct HttpShareCounts {
    http: reqwest::Client,
}

impl HttpShareCounts {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl ShareCountProvider for HttpShareCounts {
    async fn fetch(&self, url: &str) -> Result<BTreeMap<String, i64>> {
        let mut counts: BTreeMap<String, i64> = SOCIAL_PLATFORMS
            .iter()
            .map(|p| (p.to_string(), 0i64))
            .collect();

        #[derive(serde::Deserialize)]
        struct RedditInfo {
            data: RedditListing,
        }
        #[derive(serde::Deserialize)]
        struct RedditListing {
            children: Vec<RedditChild>,
        }
        #[derive(serde::Deserialize)]
        struct RedditChild {
            data: RedditPost,
        }
        #[derive(serde::Deserialize)]
        struct RedditPost {
            #[serde(default)]
            score: i64,
        }

        let endpoint = format!("https://www.reddit.com/api/info.json?url={url}");
        let resp = self.http.get(&endpoint).send().await?;
        if resp.status().is_success() {
            let info: RedditInfo = resp.json().await?;
            let total: i64 = info.data.children.iter().map(|c| c.data.score).sum();
            counts.insert("reddit".to_string(), total);
        }

        Ok(counts)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// No network: every platform reports 0. Used when share lookups are disabled
/// and in tests.
pub struct DisabledShareCounts;

#[async_trait::async_trait]
impl ShareCountProvider for DisabledShareCounts {
    async fn fetch(&self, _url: &str) -> Result<BTreeMap<String, i64>> {
        Ok(SOCIAL_PLATFORMS
            .iter()
            .map(|p| (p.to_string(), 0i64))
            .collect())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_links_are_grouped_and_deduped() {
        let html = r#"<a href="https://twitter.com/rustlang">tw</a>
            <a href="https://www.facebook.com/rustlang/">fb</a>
            <a href="https://twitter.com/rustlang">tw again</a>"#;
        let links = SocialExtractor::new().profile_links(None, html);
        assert_eq!(links["twitter"], vec!["https://twitter.com/rustlang"]);
        assert_eq!(links["facebook"], vec!["https://www.facebook.com/rustlang"]);
        assert!(!links.contains_key("reddit"));
    }

    #[test]
    fn share_widget_links_are_ignored() {
        let html = r#"<a href="https://www.facebook.com/sharer/sharer.php?u=x">share</a>"#;
        let links = SocialExtractor::new().profile_links(None, html);
        assert!(links.is_empty());
    }

    #[test]
    fn share_marker_must_end_a_path_segment() {
        let html = r#"<a href="https://www.facebook.com/shareholders">ir</a>
            <a href="https://twitter.com/intent/tweet?text=x">share</a>"#;
        let links = SocialExtractor::new().profile_links(None, html);
        assert_eq!(
            links["facebook"],
            vec!["https://www.facebook.com/shareholders"]
        );
        assert!(!links.contains_key("twitter"));
    }

    #[test]
    fn source_url_counts_as_a_reference() {
        let links =
            SocialExtractor::new().profile_links(Some("https://reddit.com/r/programming"), "");
        assert_eq!(links["reddit"], vec!["https://reddit.com/r/programming"]);
    }

    #[test]
    fn accounts_pick_first_email_and_handle() {
        let text = "Contact editor@example.org or ping @newsdesk on socials; \
                    backup: backup@example.org and @other_desk.";
        let accounts = SocialExtractor::new().accounts(text);
        assert_eq!(accounts["email"], "editor@example.org");
        assert_eq!(accounts["handle"], "@newsdesk");
    }

    #[test]
    fn no_references_yields_empty_maps() {
        let ex = SocialExtractor::new();
        assert!(ex.profile_links(None, "plain markup only").is_empty());
        assert!(ex.accounts("no identifiers here").is_empty());
    }
}
