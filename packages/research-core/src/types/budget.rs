//! The `Budget State` entity — a snapshot of the governor's counters.
//!
//! The mutable, lock-protected governor itself lives in
//! [`crate::governor`]; this type is the plain-data snapshot handed out
//! for logging, events, and tests.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetState {
    pub total_content_bytes: usize,
    pub max_content_bytes: usize,
    pub current_tokens: usize,
    pub max_tokens: usize,
    pub max_per_page_chars: usize,
}
