//! The Budget Governor: the only component that mutates budget state.
//!
//! Enforces both a byte ceiling (process memory envelope) and a token
//! ceiling (downstream model context), per spec.md §4.5. The governor is
//! the single serialization point for admissions — wrapping its counters
//! in a `tokio::sync::Mutex` lets a parallel orchestrator still preserve
//! the monotone byte/token accounting invariant from spec.md §5, §9.

use tokio::sync::Mutex;

use crate::error::GovernorError;
use crate::types::BudgetState;

/// 128 MB process ceiling minus a 16 MB safety margin.
pub const MAX_CONTENT_BYTES: usize = (128 - 16) * 1024 * 1024;
/// Approximation of when to start refusing admissions outright: 80% of
/// the 128 MB process ceiling.
pub const HEAP_GUARD_BYTES: usize = 128 * 1024 * 1024 / 5 * 4;
pub const MAX_TOKENS: usize = 32_000;
pub const MAX_PER_PAGE_CHARS: usize = 4_000;
/// Below this many bytes, a truncated candidate isn't worth admitting.
const MIN_ADMIT_BYTES: usize = 500;

pub const TRUNCATED_MEMORY_TAG: &str = "[Content truncated due to memory limits]";
pub const TRUNCATED_TOKEN_TAG: &str = "[Content optimized for token efficiency]";

#[derive(Debug, Clone)]
pub struct Admission {
    pub content: String,
    pub truncated: bool,
    pub original_length: usize,
}

struct Counters {
    total_content_bytes: usize,
    current_tokens: usize,
}

/// Tracks cumulative content bytes and estimated tokens for one request.
///
/// Lives for the duration of a single request; never shared across
/// requests (spec.md §3 ownership, §5 shared-resource policy).
pub struct BudgetGovernor {
    counters: Mutex<Counters>,
    max_content_bytes: usize,
    heap_guard_bytes: usize,
    max_tokens: usize,
    max_per_page_chars: usize,
}

impl Default for BudgetGovernor {
    fn default() -> Self {
        Self::new()
    }
}

impl BudgetGovernor {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(Counters {
                total_content_bytes: 0,
                current_tokens: 0,
            }),
            max_content_bytes: MAX_CONTENT_BYTES,
            heap_guard_bytes: HEAP_GUARD_BYTES,
            max_tokens: MAX_TOKENS,
            max_per_page_chars: MAX_PER_PAGE_CHARS,
        }
    }

    /// `estimateTokens(s) = ceil(len(s)/4)` (spec.md §4.5).
    pub fn estimate_tokens(s: &str) -> usize {
        (s.len() + 3) / 4
    }

    pub async fn state(&self) -> BudgetState {
        let counters = self.counters.lock().await;
        BudgetState {
            total_content_bytes: counters.total_content_bytes,
            max_content_bytes: self.max_content_bytes,
            current_tokens: counters.current_tokens,
            max_tokens: self.max_tokens,
            max_per_page_chars: self.max_per_page_chars,
        }
    }

    /// Admit (possibly truncating) a fetched content string under the
    /// byte ceiling. Mirrors spec.md §4.5's two-check / truncate-or-reject
    /// algorithm; never reverts an admission once made (monotone).
    pub async fn try_admit_bytes(&self, candidate: &str) -> Result<Admission, GovernorError> {
        let mut counters = self.counters.lock().await;
        let n = candidate.len();

        let fits_ceiling = counters.total_content_bytes + n <= self.max_content_bytes;
        let fits_heap_guard = counters.total_content_bytes + n <= self.heap_guard_bytes;

        if fits_ceiling && fits_heap_guard {
            counters.total_content_bytes += n;
            return Ok(Admission {
                content: candidate.to_string(),
                truncated: false,
                original_length: n,
            });
        }

        let available = self.max_content_bytes.saturating_sub(counters.total_content_bytes);
        let admitted_bytes = (available / 2).min(n);

        if admitted_bytes < MIN_ADMIT_BYTES {
            return Err(GovernorError::InsufficientMemory {
                requested: n,
                available,
            });
        }

        let truncated = truncate_at_char_boundary(candidate, admitted_bytes);
        let tagged = format!("{}\n\n{}", truncated, TRUNCATED_MEMORY_TAG);
        counters.total_content_bytes += tagged.len();

        Ok(Admission {
            content: tagged,
            truncated: true,
            original_length: n,
        })
    }

    /// `canAddContent`: would admitting `estimate` tokens exceed the
    /// ceiling?
    pub async fn can_add_content(&self, estimate: usize) -> bool {
        let counters = self.counters.lock().await;
        counters.current_tokens + estimate < self.max_tokens
    }

    /// `addContent`: admit `s`, truncating to the available token
    /// allowance (tagging it if truncated) and accounting the estimate.
    pub async fn add_content(&self, s: &str) -> String {
        let mut counters = self.counters.lock().await;
        let estimate = Self::estimate_tokens(s);

        if counters.current_tokens + estimate < self.max_tokens {
            counters.current_tokens += estimate;
            return s.to_string();
        }

        let remaining_tokens = self.max_tokens.saturating_sub(counters.current_tokens);
        let allowed_chars = remaining_tokens.saturating_mul(4);
        let truncated = truncate_at_char_boundary(s, allowed_chars);
        counters.current_tokens += Self::estimate_tokens(&truncated);
        format!("{}\n\n{}", truncated, TRUNCATED_TOKEN_TAG)
    }

    /// Cap a page's content to `max_per_page_chars`, preferring to cut on
    /// a sentence boundary within the last 20% of the cut window
    /// (spec.md §4.4).
    pub fn cap_per_page(&self, content: &str) -> String {
        cap_per_page_at(content, self.max_per_page_chars)
    }
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Cap `content` at `max_chars`, cutting on the nearest sentence boundary
/// (`. ` / `.\n` / `! ` / `? `) found within the last 20% of the window,
/// else a hard cut.
pub fn cap_per_page_at(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }

    let truncated: String = content.chars().take(max_chars).collect();
    let window_start = (max_chars as f64 * 0.8) as usize;
    let search_region: String = truncated.chars().skip(window_start).collect();

    let boundary = [". ", ".\n", "! ", "? "]
        .iter()
        .filter_map(|needle| search_region.rfind(needle).map(|pos| pos + needle.trim_end().len()))
        .max();

    match boundary {
        Some(pos) => truncated.chars().take(window_start + pos).collect(),
        None => truncated,
    }
}
