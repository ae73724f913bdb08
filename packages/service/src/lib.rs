//! Research Orchestrator - API Core
//!
//! HTTP transport for the research orchestrator: request parsing, edge
//! auth, JSON/SSE response composition. The orchestrator itself lives in
//! `research-core`; this crate only wires it to `axum`.

pub mod config;
pub mod server;

pub use config::Config;
