//! Router construction, grounded on the teacher's `server/src/server/app.rs`
//! shape: Extension-based shared state, a CORS layer permissive enough for
//! browser clients, a trace layer, and an edge-auth middleware that runs
//! before the handler ever sees the request.

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::routing::{get, post};
use axum::{middleware, Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::server::middleware::edge_auth_middleware;
use crate::server::routes::{health_handler, research_handler};

/// Shared state handed to every handler via `Extension`.
///
/// Holds only process-level config; every per-request credential and
/// orchestrator dependency is constructed fresh inside the `/research`
/// handler (spec.md §5: no state is shared across requests).
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
}

pub fn build_app(config: Config) -> Router {
    let state = AppState { config };

    let cors = CorsLayer::new().allow_origin(tower_http::cors::Any).allow_methods([Method::GET, Method::POST, Method::OPTIONS]).allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .route("/research", post(research_handler))
        .layer(middleware::from_fn_with_state(state.clone(), edge_auth_middleware))
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
