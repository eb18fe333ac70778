// src/enrich/markdown.rs
//! Tag-level HTML→Markdown conversion (ATX headings, emphasis, images, lists,
//! paragraphs). Anchor tags render as their text, script/style bodies are
//! dropped, and any tag without a Markdown counterpart is stripped.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

macro_rules! re {
    ($name:ident, $pat:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($pat).expect("markdown regex"));
    };
}

re!(RE_DROP, r"(?is)<(script|style|head)[^>]*>.*?</(script|style|head)\s*>");
re!(RE_COMMENT, r"(?s)<!--.*?-->");
re!(RE_HEADING, r"(?is)<h([1-6])[^>]*>(.*?)</h[1-6]\s*>");
re!(RE_BOLD, r"(?is)<(?:strong|b)[^>]*>(.*?)</(?:strong|b)\s*>");
re!(RE_EM, r"(?is)<(?:em|i)[^>]*>(.*?)</(?:em|i)\s*>");
re!(RE_CODE, r"(?is)<code[^>]*>(.*?)</code\s*>");
re!(RE_IMG, r#"(?is)<img[^>]*?src\s*=\s*["']([^"']+)["'][^>]*>"#);
re!(RE_LI, r"(?is)<li[^>]*>(.*?)</li\s*>");
re!(RE_BLOCKQUOTE, r"(?is)<blockquote[^>]*>(.*?)</blockquote\s*>");
re!(RE_BR, r"(?is)<br\s*/?>");
re!(RE_P_OPEN, r"(?is)<(?:p|div|section|article|ul|ol|table|tr)[^>]*>");
re!(RE_P_CLOSE, r"(?is)</(?:p|div|section|article|ul|ol|table|tr)\s*>");
re!(RE_TAGS, r"<[^>]*>");
re!(RE_BLANKS, r"\n{3,}");
re!(RE_SPACES, r"[ \t]+");
re!(RE_ALT, r#"(?is)alt\s*=\s*["']([^"']*)["']"#);

/// Convert an HTML fragment to Markdown. Lossy on purpose; an empty input
/// yields an empty string.
pub fn html_to_markdown(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let out = RE_DROP.replace_all(html, "");
    let out = RE_COMMENT.replace_all(&out, "");

    let out = RE_HEADING.replace_all(&out, |caps: &Captures| {
        let level: usize = caps[1].parse().unwrap_or(1);
        format!("\n\n{} {}\n\n", "#".repeat(level), caps[2].trim())
    });

    let out = RE_IMG.replace_all(&out, |caps: &Captures| {
        let alt = RE_ALT
            .captures(caps.get(0).map_or("", |m| m.as_str()))
            .and_then(|c| c.get(1))
            .map_or(String::new(), |m| m.as_str().to_string());
        format!("![{}]({})", alt, &caps[1])
    });

    let out = RE_BOLD.replace_all(&out, "**$1**");
    let out = RE_EM.replace_all(&out, "*$1*");
    let out = RE_CODE.replace_all(&out, "`$1`");
    let out = RE_LI.replace_all(&out, |caps: &Captures| format!("\n- {}", caps[1].trim()));
    let out = RE_BLOCKQUOTE.replace_all(&out, |caps: &Captures| {
        format!("\n\n> {}\n\n", caps[1].trim())
    });
    let out = RE_BR.replace_all(&out, "\n");
    let out = RE_P_OPEN.replace_all(&out, "\n\n");
    let out = RE_P_CLOSE.replace_all(&out, "\n\n");

    // Anything left over (anchors included) is stripped down to its text.
    let out = RE_TAGS.replace_all(&out, "");
    let out = html_escape::decode_html_entities(&out).to_string();

    let out = RE_SPACES.replace_all(&out, " ");
    let out = RE_BLANKS.replace_all(&out, "\n\n");

    // Per-line trim keeps list markers and headings flush left.
    out.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
