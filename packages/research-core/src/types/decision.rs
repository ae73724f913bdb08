//! Tagged-variant LLM decision outputs.
//!
//! spec.md §9 recommends parsing dynamic JSON outputs into tagged
//! variants rather than a loose map, falling back to documented defaults
//! on any parse failure. These enums are that contract.

use serde::{Deserialize, Serialize};

/// Output of the initial decision call (auto mode only): exactly one of
/// "answer directly" or "search these queries".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitialDecision {
    Direct { response: String },
    Search { search_queries: Vec<String> },
}

impl InitialDecision {
    /// The documented fallback when the model's JSON can't be parsed:
    /// search using the original query as the sole term.
    pub fn parse_fallback(original_query: &str) -> Self {
        InitialDecision::Search {
            search_queries: vec![original_query.to_string()],
        }
    }

    /// Parse a raw model response, applying the spec.md §4.6 fallback on
    /// any failure (malformed JSON, wrong shape, or a reply that isn't
    /// even JSON).
    pub fn parse(raw: &str, original_query: &str) -> Self {
        match serde_json::from_str::<InitialDecision>(raw) {
            Ok(mut decision) => {
                if let InitialDecision::Search { search_queries } = &mut decision {
                    search_queries.truncate(3);
                    if search_queries.is_empty() {
                        return Self::parse_fallback(original_query);
                    }
                }
                decision
            }
            Err(_) => Self::parse_fallback(original_query),
        }
    }
}

/// Output of a continuation check: stop, or continue with up to two
/// follow-up queries.
///
/// `Continue` is listed before `Stop`: serde's untagged matching tries
/// variants in declaration order and `Stop` has no `next_queries` field,
/// so a continue-shaped payload tried against `Stop` first would silently
/// drop `next_queries` (untagged variants ignore unknown fields by
/// default) rather than fail over to the right variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContinuationDecision {
    Continue {
        #[serde(rename = "continue")]
        cont: bool,
        reason: String,
        next_queries: Vec<String>,
    },
    Stop {
        #[serde(rename = "continue")]
        cont: bool,
        reason: String,
    },
}

impl ContinuationDecision {
    pub fn stop(reason: impl Into<String>) -> Self {
        ContinuationDecision::Stop {
            cont: false,
            reason: reason.into(),
        }
    }

    pub fn should_continue(&self) -> bool {
        matches!(self, ContinuationDecision::Continue { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            ContinuationDecision::Stop { reason, .. } => reason,
            ContinuationDecision::Continue { reason, .. } => reason,
        }
    }

    /// Follow-up queries, capped at 2 per spec.md §3's invariant.
    pub fn next_queries(&self) -> Vec<String> {
        match self {
            ContinuationDecision::Stop { .. } => vec![],
            ContinuationDecision::Continue { next_queries, .. } => {
                let mut qs = next_queries.clone();
                qs.truncate(2);
                qs
            }
        }
    }

    /// Parse a raw model response, applying the spec.md §4.6 fallback
    /// (`continue: false, reason: "Parse error - stopping search"`) on
    /// any failure.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str::<ContinuationDecision>(raw)
            .unwrap_or_else(|_| Self::stop("Parse error - stopping search"))
    }

    /// Force a stop regardless of what the model said, used once the
    /// iteration cap (`MAX_ITERATIONS`) is reached.
    pub fn force_stop_at_cap(self) -> Self {
        Self::stop(format!("{} (iteration cap reached)", self.reason()))
    }
}
