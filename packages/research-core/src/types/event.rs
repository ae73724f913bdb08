//! The streaming event protocol (spec.md §6.2).
//!
//! Each variant carries its own payload shape; `Event::kind()` gives the
//! SSE event name. The orchestrator emits these on an internal channel
//! (see [`crate::orchestrator`]); the transport layer in `service` turns
//! them into either one JSON response or an SSE stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::decision::{ContinuationDecision, InitialDecision};
use super::query::SearchMode;
use super::result::SearchResultItem;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    InitialDecision,
    SearchIteration,
    ContinuationCheck,
    SearchComplete,
    FinalGeneration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitMetadata {
    pub search_mode: SearchMode,
    pub model: String,
    pub iterations: usize,
    pub max_iterations: usize,
    pub total_search_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResponsePayload {
    pub response: String,
    pub total_results: usize,
    pub search_iterations: usize,
    pub search_results: Vec<SearchResultItem>,
    pub searches: Vec<String>,
}

/// One event in the orchestrator's lifecycle (spec.md §6.2's table,
/// §3's invariant: no event is emitted after a terminal `complete` or
/// `error`).
///
/// Serialized `#[serde(untagged)]`: the event kind is carried by the SSE
/// `event:` line (see [`Event::kind`]), not duplicated as a `"type"`
/// field inside the JSON payload — `Step`'s own `step_type` field is the
/// only `"type"` key on the wire for a `step` event.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Event {
    Log { message: String, timestamp: DateTime<Utc> },

    Init {
        query: String,
        searches: Vec<String>,
        #[serde(rename = "finalResponse")]
        final_response: Option<String>,
        metadata: InitMetadata,
    },

    Step {
        #[serde(rename = "type")]
        step_type: StepType,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        iteration: Option<usize>,
        timestamp: DateTime<Utc>,
    },

    Decision {
        decision: InitialDecision,
        timestamp: DateTime<Utc>,
    },

    Search {
        term: String,
        iteration: usize,
        #[serde(rename = "searchIndex")]
        search_index: usize,
        #[serde(rename = "totalSearches")]
        total_searches: usize,
        timestamp: DateTime<Utc>,
    },

    SearchResults {
        term: String,
        #[serde(rename = "resultsCount")]
        results_count: usize,
        iteration: usize,
        timestamp: DateTime<Utc>,
    },

    Continuation {
        #[serde(rename = "shouldContinue")]
        should_continue: bool,
        reasoning: String,
        iteration: usize,
        timestamp: DateTime<Utc>,
    },

    FinalResponse {
        #[serde(flatten)]
        payload: FinalResponsePayload,
        timestamp: DateTime<Utc>,
    },

    Complete {
        result: Value,
        #[serde(rename = "executionTime")]
        execution_time_ms: u128,
        timestamp: DateTime<Utc>,
    },

    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// The SSE event name (the `event:` line), matching the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Log { .. } => "log",
            Event::Init { .. } => "init",
            Event::Step { .. } => "step",
            Event::Decision { .. } => "decision",
            Event::Search { .. } => "search",
            Event::SearchResults { .. } => "search_results",
            Event::Continuation { .. } => "continuation",
            Event::FinalResponse { .. } => "final_response",
            Event::Complete { .. } => "complete",
            Event::Error { .. } => "error",
        }
    }

    /// Terminal events end the stream; no event may follow one
    /// (spec.md §3 invariant).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Complete { .. } | Event::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_and_error_are_terminal() {
        let now = Utc::now();
        assert!(Event::Complete {
            result: Value::Null,
            execution_time_ms: 10,
            timestamp: now
        }
        .is_terminal());
        assert!(Event::Error {
            error: "boom".into(),
            stack: None,
            timestamp: now
        }
        .is_terminal());
        assert!(!Event::Log {
            message: "starting".into(),
            timestamp: now
        }
        .is_terminal());
    }

    #[test]
    fn search_payload_carries_no_outer_type_field() {
        let now = Utc::now();
        let event = Event::Search {
            term: "rust".into(),
            iteration: 0,
            search_index: 0,
            total_searches: 1,
            timestamp: now,
        };
        assert_eq!(event.kind(), "search");
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("type").is_none());
        assert_eq!(json["term"], "rust");
    }

    #[test]
    fn step_payload_has_exactly_one_type_key() {
        let now = Utc::now();
        let event = Event::Step {
            step_type: StepType::InitialDecision,
            message: "deciding".into(),
            iteration: None,
            timestamp: now,
        };
        assert_eq!(event.kind(), "step");
        let json = serde_json::to_value(&event).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.keys().filter(|k| *k == "type").count(), 1);
        assert_eq!(json["type"], "initial_decision");
    }
}
