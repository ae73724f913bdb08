//! The `Digest` entity: one per executed search query, appended across iterations.

use serde::{Deserialize, Serialize};

use super::result::{Link, SearchResultItem};

/// An LLM-produced summary of one query's top results, with two
/// representative links and the full raw result set.
///
/// Digests are tagged `(iteration, query_index)` at creation time and are
/// appended in that lexicographic order; that order is also the order
/// used when composing the final synthesis prompt (spec.md §5, §8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    pub iteration: usize,
    pub query_index: usize,
    pub search_query: String,
    pub summary: String,
    pub links: Vec<Link>,
    pub raw_results: Vec<SearchResultItem>,
}

impl Digest {
    pub fn new(
        iteration: usize,
        query_index: usize,
        search_query: impl Into<String>,
        summary: impl Into<String>,
        links: Vec<Link>,
        raw_results: Vec<SearchResultItem>,
    ) -> Self {
        Self {
            iteration,
            query_index,
            search_query: search_query.into(),
            summary: summary.into(),
            links,
            raw_results,
        }
    }

    /// Sort key matching the `(iteration asc, queryIndex asc)` ordering
    /// invariant from spec.md §5 and §8.
    pub fn order_key(&self) -> (usize, usize) {
        (self.iteration, self.query_index)
    }
}
