//! Edge authentication (spec.md §6.1, §9): a shared-secret equality
//! check on `access_secret`, and an **unverified** JWT payload parse for
//! `google_token` presence/whitelist.
//!
//! Grounded on the extract-then-attach shape of the teacher's JWT
//! middleware, but implementing the reference behavior spec.md §9
//! explicitly flags: the identity token's signature is never verified
//! here. A production rewrite should replace this with real
//! verification; this system carries it as specified.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;

use crate::server::app::AppState;
use crate::server::request::{RequestParseError, ResearchRequest};
use crate::server::response::ErrorEnvelope;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Parses and authenticates the request body, then attaches the parsed
/// [`ResearchRequest`] to the request's extensions for the handler to
/// pick up — avoids parsing the JSON body twice.
pub async fn edge_auth_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return invalid_input("request body too large or unreadable"),
    };

    let parsed = match ResearchRequest::parse(&bytes) {
        Ok(req) => req,
        Err(RequestParseError::MalformedJson) => return invalid_input("request body is not valid JSON"),
        Err(RequestParseError::EmptyQuery) => return invalid_input("query must not be empty"),
        Err(RequestParseError::MissingApiKey) => return invalid_input("api_key is required"),
    };

    if let Some(expected) = &state.config.access_secret {
        match &parsed.access_secret {
            Some(provided) if provided == expected => {}
            _ => return unauthorized("invalid access_secret"),
        }
    }

    if let Some(token) = &parsed.google_token {
        if decode_unverified_payload(token).is_none() {
            return unauthorized("invalid google_token");
        }
    }

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(parsed);
    next.run(request).await
}

/// Splits a JWT on `.` and base64-decodes the payload segment *without*
/// verifying the signature (spec.md §9's explicitly-flagged reference
/// behavior). Returns the decoded payload as JSON only to confirm it
/// parses; the claims themselves aren't consulted beyond that, since
/// no whitelist source is specified at this layer.
fn decode_unverified_payload(token: &str) -> Option<serde_json::Value> {
    let payload_segment = token.split('.').nth(1)?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload_segment).ok()?;
    serde_json::from_slice(&decoded).ok()
}

fn invalid_input(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, axum::Json(ErrorEnvelope::new(message, "INVALID_INPUT", None))).into_response()
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, axum::Json(ErrorEnvelope::new(message, "UNAUTHORIZED", None))).into_response()
}
