//! Relevance Scorer (spec.md §4.3): a deterministic additive score from
//! query-token matches plus a fixed domain-authority table.
//!
//! Grounded on the teacher's const-table idiom in
//! `extraction/src/pipeline/prompts.rs`, adapted here for a scoring table
//! instead of prompt fragments.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::result::SearchResultItem;

/// Below this score a result is dropped before any content fetch.
pub const QUALITY_THRESHOLD: i64 = 20;
/// Processed regardless of the caller's requested `limit`.
pub const MAX_PROCESSED: usize = 8;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "is", "are", "was", "were", "be", "been", "being", "this", "that", "these", "those", "it",
    "its", "as", "from", "what", "when", "where", "how", "why", "who",
];

/// `(url substring, score)`, checked against the lowercased result URL.
/// Earlier, more specific entries are checked first so a host matching
/// several substrings gets its highest applicable tier.
const DOMAIN_AUTHORITY: &[(&str, i64)] = &[
    ("wikipedia.org", 200),
    ("britannica.com", 180),
    ("nytimes.com", 170),
    ("bbc.com", 170),
    ("bbc.co.uk", 170),
    ("reuters.com", 170),
    ("apnews.com", 160),
    ("theguardian.com", 150),
    ("washingtonpost.com", 150),
    ("nature.com", 140),
    ("sciencedirect.com", 130),
    ("scholar.google.com", 130),
    ("arxiv.org", 120),
    ("who.int", 120),
    ("un.org", 120),
    (".gov", 110),
    (".ac.uk", 110),
    (".edu", 100),
    ("stackoverflow.com", 100),
    ("github.com", 90),
    ("developer.mozilla.org", 100),
    ("techcrunch.com", 80),
    ("arstechnica.com", 80),
    ("wired.com", 70),
    (".org", 40),
    (".net", 20),
];

fn tokenize(query: &str) -> Vec<String> {
    static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
    let stripped = PUNCTUATION.replace_all(&query.to_lowercase(), "");
    stripped
        .split_whitespace()
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

fn word_boundary_matches(text: &str, token: &str) -> bool {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(token));
    Regex::new(&pattern).map(|re| re.is_match(text)).unwrap_or(false)
}

fn domain_authority_score(url: &str) -> i64 {
    let lower = url.to_lowercase();
    DOMAIN_AUTHORITY
        .iter()
        .find(|(substr, _)| lower.contains(substr))
        .map(|(_, score)| *score)
        .unwrap_or(0)
}

/// Score one result against a query, per spec.md §4.3's additive formula.
pub fn score(result: &SearchResultItem, query: &str) -> i64 {
    let tokens = tokenize(query);

    let mut title_matches = 0;
    let mut title_score = 0;
    for token in &tokens {
        if word_boundary_matches(&result.title, token) {
            title_matches += 1;
            title_score += 25;
        }
    }
    if title_matches >= 2 {
        title_score += 10 * title_matches;
    }

    let description_score: i64 = tokens
        .iter()
        .filter(|token| word_boundary_matches(&result.description, token))
        .map(|_| 10)
        .sum();

    let base = result.engine_score.unwrap_or(0);

    base + title_score + description_score + domain_authority_score(&result.url)
}

/// Score every result, keep those at or above [`QUALITY_THRESHOLD`], sort
/// descending by score, and cap at [`MAX_PROCESSED`] (spec.md §4.3's
/// tie-break and quality filter).
pub fn score_filter_and_rank(mut results: Vec<SearchResultItem>, query: &str) -> Vec<SearchResultItem> {
    for result in &mut results {
        result.score = score(result, query);
    }
    results.retain(|r| r.score >= QUALITY_THRESHOLD);
    results.sort_by(|a, b| b.score.cmp(&a.score));
    results.truncate(MAX_PROCESSED);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str, description: &str, url: &str) -> SearchResultItem {
        SearchResultItem::new(title, url, description)
    }

    #[test]
    fn title_match_outscores_description_match() {
        let title_hit = result("Rust programming guide", "unrelated text", "https://example.com/a");
        let desc_hit = result("unrelated title", "a guide to rust programming", "https://example.com/b");
        assert!(score(&title_hit, "rust programming") > score(&desc_hit, "rust programming"));
    }

    #[test]
    fn two_title_matches_get_a_bonus() {
        let one_match = result("rust guide", "", "https://example.com/a");
        let two_match = result("rust programming tutorial", "", "https://example.com/b");
        // two_match: 25*2 title hits + 10*2 bonus = 70; one_match: 25.
        assert_eq!(score(&one_match, "rust programming tutorial"), 25);
        assert_eq!(score(&two_match, "rust programming tutorial"), 25 * 2 + 10 * 2);
    }

    #[test]
    fn wikipedia_gets_top_domain_tier() {
        let r = result("", "", "https://en.wikipedia.org/wiki/Rust");
        assert_eq!(score(&r, "anything"), 200);
    }

    #[test]
    fn word_boundary_matching_does_not_match_substrings() {
        // "cat" must not match inside "category".
        let r = result("category listing", "", "https://example.net/x");
        assert_eq!(score(&r, "cat"), 20); // only the .net domain bonus
    }

    #[test]
    fn stop_words_and_short_tokens_are_not_scored() {
        let r = result("the an of it", "", "https://example.com/z");
        assert_eq!(score(&r, "the and of"), 0);
    }

    #[test]
    fn engine_score_is_added_as_a_base() {
        let mut r = result("irrelevant", "irrelevant", "https://example.com/q");
        r.engine_score = Some(7);
        assert_eq!(score(&r, "nothing matches here"), 7);
    }

    #[test]
    fn filter_drops_low_scores_and_caps_at_eight() {
        let mut results = Vec::new();
        for i in 0..12 {
            let mut r = result(&format!("wikipedia result {i}"), "", "https://en.wikipedia.org/x");
            r.engine_score = Some(i as i64);
            results.push(r);
        }
        results.push(result("no match", "no match", "https://example.com/low"));

        let filtered = score_filter_and_rank(results, "wikipedia result");
        assert_eq!(filtered.len(), MAX_PROCESSED);
        assert!(filtered.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(filtered.iter().all(|r| r.score >= QUALITY_THRESHOLD));
    }
}
