//! The research orchestrator core: planning state machine, search-engine
//! extraction and scoring pipeline, the memory/token budget governor,
//! and the streaming event protocol that exposes these phases.

pub mod error;
pub mod extract;
pub mod fetch;
pub mod governor;
pub mod llm_calls;
pub mod orchestrator;
pub mod score;
pub mod search;
pub mod security;
pub mod testing;
pub mod types;

pub use error::{OrchestratorError, Result};
pub use llm_calls::ResearchLlm;
pub use orchestrator::Orchestrator;
pub use search::SearchEngineClient;
pub use types::{BudgetState, ContinuationDecision, Digest, Event, InitialDecision, PromptOverrides, Query, ResearchOutcome, SearchMode, SearchResultItem};
