//! `POST /research` (spec.md §6.1-§6.3): runs one orchestrator request to
//! completion and responds with either a single JSON body or an SSE
//! stream of lifecycle events, depending on `Accept` / `?stream=true`.

use std::sync::Arc;

use axum::extract::{Extension, Query as QueryParams};
use axum::http::header::{CACHE_CONTROL, CONNECTION};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use research_core::{Event, Orchestrator, SearchEngineClient};
use research_core::fetch::HttpFetcher;
use research_core::governor::BudgetGovernor;
use research_core::llm_calls::{ResearchLanguageModel, ResearchLlm};
use research_core::search::WebSearcher;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

use crate::server::app::AppState;
use crate::server::request::ResearchRequest;
use crate::server::response::map_error;

#[derive(Debug, Deserialize)]
pub struct StreamQueryParam {
    #[serde(default)]
    stream: bool,
}

#[derive(Serialize)]
struct SuccessEnvelope<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    outcome: T,
}

fn wants_streaming(headers: &HeaderMap, query: &StreamQueryParam) -> bool {
    query.stream
        || headers
            .get(axum::http::header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("text/event-stream"))
            .unwrap_or(false)
}

fn build_orchestrator(state: &AppState, request: &ResearchRequest) -> (Orchestrator, tokio::sync::mpsc::Receiver<Event>) {
    let model_spec = request.model.clone().unwrap_or_else(|| state.config.default_model.clone());
    let mut llm = ResearchLlm::new(&model_spec, request.api_key.clone());
    if let Some(endpoint) = &state.config.llm_endpoint_override {
        llm = llm.with_endpoint_override(endpoint.clone());
    }
    let llm = Arc::new(llm);

    let fetcher = Arc::new(HttpFetcher::new());
    let governor = Arc::new(BudgetGovernor::new());
    let mut search_client = SearchEngineClient::new(fetcher, governor).with_summarizer(llm.clone());
    if let Some(base_url) = &state.config.search_endpoint_override {
        search_client = search_client.with_search_base_url(base_url.clone());
    }

    let llm: Arc<dyn ResearchLanguageModel> = llm;
    let searcher: Arc<dyn WebSearcher> = Arc::new(search_client);

    let (orchestrator, rx) = Orchestrator::new(llm, searcher);
    (orchestrator.with_max_iterations(state.config.max_iterations), rx)
}

/// Handles a non-streaming request: run to completion, return JSON.
async fn handle_json(state: AppState, request: ResearchRequest) -> Response {
    let query = request.to_query(&state.config.default_model);
    let (orchestrator, _rx) = build_orchestrator(&state, &request);

    match orchestrator.run(&query).await {
        Ok(outcome) => (StatusCode::OK, Json(SuccessEnvelope { success: true, outcome })).into_response(),
        Err(err) => {
            let (status, envelope) = map_error(&err, state.config.debug_errors);
            (status, Json(envelope)).into_response()
        }
    }
}

/// Handles a streaming request: drain the orchestrator's event channel
/// into an SSE response (spec.md §6.2).
///
/// `Sse` only sets `Content-Type: text/event-stream` by default; spec.md
/// §6.2 additionally requires `Cache-Control: no-cache` and
/// `Connection: keep-alive`, so both are inserted explicitly.
async fn handle_sse(state: AppState, request: ResearchRequest) -> Response {
    let query = request.to_query(&state.config.default_model);
    let (orchestrator, rx) = build_orchestrator(&state, &request);

    tokio::spawn(async move {
        let _ = orchestrator.run(&query).await;
    });

    let events = ReceiverStream::new(rx).map(to_sse_event);
    let mut response = Sse::new(events).keep_alive(KeepAlive::default()).into_response();
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}

fn to_sse_event(event: Event) -> Result<SseEvent, std::convert::Infallible> {
    let name = event.kind();
    match SseEvent::default().event(name).json_data(&event) {
        Ok(sse) => Ok(sse),
        Err(_) => Ok(SseEvent::default().event("error").data("failed to encode event")),
    }
}

pub async fn research_handler(
    Extension(state): Extension<AppState>,
    Extension(request): Extension<ResearchRequest>,
    QueryParams(stream_param): QueryParams<StreamQueryParam>,
    headers: HeaderMap,
) -> Response {
    if wants_streaming(&headers, &stream_param) {
        handle_sse(state, request).await
    } else {
        handle_json(state, request).await
    }
}
