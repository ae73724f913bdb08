//! Domain types for the research orchestrator.

pub mod budget;
pub mod decision;
pub mod digest;
pub mod event;
pub mod outcome;
pub mod query;
pub mod result;

pub use budget::BudgetState;
pub use decision::{ContinuationDecision, InitialDecision};
pub use digest::Digest;
pub use event::Event;
pub use outcome::{LlmResponseMeta, ResearchOutcome, ResponseMode};
pub use query::{PromptOverrides, Query, SearchMode};
pub use result::{Link, SearchResultItem};
