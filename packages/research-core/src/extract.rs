//! HTML Extractor: regex-based extraction, no DOM construction.
//!
//! Two modes (spec.md §4.2):
//! 1. Search-results extraction, reading canonical fields from hidden
//!    inputs with visible-element fallbacks, falling back further to a
//!    generic link harvester when no known block shape matches.
//! 2. Article extraction: prefer `<main>`/`<article>`/`.content`, strip
//!    boilerplate elements, then strip remaining tags.
//!
//! Grounded on the teacher's regex style in
//! `extraction/src/ingestors/http.rs` (`html_to_markdown`, `extract_title`,
//! `extract_links`), generalized into the two extraction contracts this
//! system needs.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::result::SearchResultItem;

const NAV_PATTERNS: &[&str] = &[
    "/page/", "/edit/", "/user/", "/admin/", "javascript:", "#", "mailto:", "/search?", "/tag/",
    "/category/",
];

static RESULT_BLOCK_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<table[^>]*class="[^"]*result[^"]*"[^>]*>(.*?)</table>"#).unwrap());
static RESULT_BLOCK_DIV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<div[^>]*class="[^"]*\bresult\b[^"]*"[^>]*>(.*?)</div>"#).unwrap());
static RESULT_BLOCK_WEB_RESULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<div[^>]*class="[^"]*web-result[^"]*"[^>]*>(.*?)</div>"#).unwrap());

static HIDDEN_INPUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<input[^>]*type="hidden"[^>]*name="(url|title|extract|score|state)"[^>]*value="([^"]*)"[^>]*>"#).unwrap()
});
static TITLE_P: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<p[^>]*class="[^"]*title[^"]*"[^>]*>(.*?)</p>"#).unwrap());
static EXTRACT_P: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<p[^>]*class="[^"]*extract[^"]*"[^>]*>(.*?)</p>"#).unwrap());

static ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<a[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#).unwrap());

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static SCRIPT_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</\1>").unwrap());
static NAV_ASIDE_HEADER_FOOTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(nav|aside|header|footer)[^>]*>.*?</\1>").unwrap());

static MAIN_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<main[^>]*>(.*?)</main>").unwrap());
static ARTICLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<article[^>]*>(.*?)</article>").unwrap());
static CONTENT_DIV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<div[^>]*(?:class|id)="[^"]*content[^"]*"[^>]*>(.*?)</div>"#).unwrap());

/// Decode the fixed set of HTML entities named in spec.md §4.2, including
/// numeric forms. Applying this twice is a no-op on already-decoded text
/// (spec.md §8 idempotence property) because none of the replacements
/// introduce a new `&`.
pub fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&#x2F;", "/")
        .replace("&#x60;", "`")
        .replace("&#x3D;", "=")
}

pub(crate) fn strip_tags(html: &str) -> String {
    let no_tags = TAG.replace_all(html, " ");
    WHITESPACE.replace_all(&no_tags, " ").trim().to_string()
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Extract canonical search-result records from the DuckDuckGo HTML
/// results page. Tries `<table class~="result">`, then
/// `<div class~="result">`, then `<div class~="web-result">`; falls back
/// to harvesting all anchors if none match.
pub fn extract_search_results(html: &str) -> Vec<SearchResultItem> {
    for pattern in [&*RESULT_BLOCK_TABLE, &*RESULT_BLOCK_DIV, &*RESULT_BLOCK_WEB_RESULT] {
        let blocks: Vec<&str> = pattern.captures_iter(html).filter_map(|c| c.get(1)).map(|m| m.as_str()).collect();
        if !blocks.is_empty() {
            let results: Vec<SearchResultItem> = blocks.iter().filter_map(|block| extract_one_result(block)).collect();
            if !results.is_empty() {
                return results;
            }
        }
    }
    harvest_links_fallback(html)
}

fn extract_one_result(block: &str) -> Option<SearchResultItem> {
    let mut hidden = std::collections::HashMap::new();
    for cap in HIDDEN_INPUT.captures_iter(block) {
        hidden.insert(cap[1].to_string(), cap[2].to_string());
    }

    let url = hidden
        .get("url")
        .cloned()
        .filter(|u| is_http_url(u))
        .or_else(|| {
            ANCHOR
                .captures(block)
                .map(|c| c[1].to_string())
                .filter(|u| is_http_url(u))
        })?;

    let title = hidden
        .get("title")
        .cloned()
        .or_else(|| TITLE_P.captures(block).map(|c| strip_tags(&c[1])))
        .unwrap_or_default();

    let description = hidden
        .get("extract")
        .cloned()
        .or_else(|| EXTRACT_P.captures(block).map(|c| strip_tags(&c[1])))
        .unwrap_or_default();

    let engine_score = hidden
        .get("score")
        .and_then(|s| if s == "None" { None } else { s.parse::<i64>().ok() });

    let mut result = SearchResultItem::new(decode_entities(&title), url, decode_entities(&description));
    result.engine_score = engine_score;
    Some(result)
}

/// Fallback when none of the three block patterns match: scan all
/// `<a href>` elements, keeping links with an `http`-prefixed href, anchor
/// text of at least 10 characters, and a URL that doesn't match any
/// navigation pattern. Description is derived from surrounding text.
fn harvest_links_fallback(html: &str) -> Vec<SearchResultItem> {
    let mut results = Vec::new();

    for cap in ANCHOR.captures_iter(html) {
        let href = &cap[1];
        let text = strip_tags(&cap[2]);

        if !is_http_url(href) {
            continue;
        }
        if text.chars().count() < 10 {
            continue;
        }
        let href_lower = href.to_lowercase();
        if NAV_PATTERNS.iter().any(|p| href_lower.contains(p)) {
            continue;
        }

        let whole_match = cap.get(0).unwrap();
        let surround_start = whole_match.start().saturating_sub(200);
        let surround_end = (whole_match.end() + 200).min(html.len());
        let surround_start = nearest_char_boundary(html, surround_start);
        let surround_end = nearest_char_boundary(html, surround_end);
        let description = strip_tags(&html[surround_start..surround_end]);

        results.push(SearchResultItem::new(decode_entities(&text), href.to_string(), decode_entities(&description)));
    }

    results
}

fn nearest_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx.min(s.len())
}

/// Extract the main readable text of an article page: prefer
/// `<main>`/`<article>`/a content-classed `<div>`, strip boilerplate
/// elements, then strip remaining tags and collapse whitespace.
pub fn extract_article(html: &str) -> String {
    let without_boilerplate = NAV_ASIDE_HEADER_FOOTER.replace_all(&SCRIPT_STYLE.replace_all(html, ""), "");

    let body = MAIN_TAG
        .captures(&without_boilerplate)
        .or_else(|| ARTICLE_TAG.captures(&without_boilerplate))
        .or_else(|| CONTENT_DIV.captures(&without_boilerplate))
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| without_boilerplate.to_string());

    decode_entities(&strip_tags(&body))
}
