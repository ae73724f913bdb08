//! Integration tests driving `build_app()` end to end: edge auth, the
//! JSON/SSE dispatch in `routes::research`, and the streaming headers
//! spec.md §6.2 requires. Upstream LLM and search-engine calls are
//! stubbed with `wiremock` via `Config`'s test-only endpoint overrides.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::json;
use service_core::{server::build_app, Config};
use tower::ServiceExt;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn base_config() -> Config {
    Config {
        port: 0,
        access_secret: None,
        default_model: "groq:llama-3.1-8b-instant".to_string(),
        max_iterations: 3,
        debug_errors: true,
        llm_endpoint_override: None,
        search_endpoint_override: None,
    }
}

fn chat_completion_body(content: &str) -> serde_json::Value {
    json!({
        "model": "llama-3.1-8b-instant",
        "choices": [{"message": {"content": content}}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

fn search_results_page(blocks: &[(&str, &str, &str)]) -> String {
    let mut html = String::from("<html><body>");
    for (url, title, extract) in blocks {
        html.push_str(&format!(
            r#"<div class="result"><input type="hidden" name="url" value="{url}">
            <input type="hidden" name="title" value="{title}">
            <input type="hidden" name="extract" value="{extract}"></div>"#
        ));
    }
    html.push_str("</body></html>");
    html
}

async fn post(app: Router, path: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

#[tokio::test]
async fn health_check_bypasses_auth_even_with_a_configured_access_secret() {
    let mut config = base_config();
    config.access_secret = Some("shh".to_string());
    let app = build_app(config);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn research_rejects_a_mismatched_access_secret() {
    let mut config = base_config();
    config.access_secret = Some("correct-secret".to_string());
    let app = build_app(config);

    let response = post(app, "/research", json!({"query": "what is rust?", "api_key": "sk-test", "access_secret": "wrong"})).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["errorType"], "UNAUTHORIZED");
}

#[tokio::test]
async fn research_rejects_an_empty_query_before_touching_the_orchestrator() {
    let app = build_app(base_config());

    let response = post(app, "/research", json!({"query": "   ", "api_key": "sk-test"})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["errorType"], "INVALID_INPUT");
}

#[tokio::test]
async fn direct_mode_round_trips_through_the_json_response() {
    let llm_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_body("Rust is a systems programming language.")))
        .mount(&llm_server)
        .await;

    let mut config = base_config();
    config.llm_endpoint_override = Some(format!("{}/mock/chat", llm_server.uri()));
    let app = build_app(config);

    let response = post(app, "/research", json!({"query": "what is rust?", "api_key": "sk-test", "search_mode": "direct"})).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["success"], true);
    assert_eq!(parsed["answer"], "Rust is a systems programming language.");
    assert!(parsed["searchResults"].is_null());
}

#[tokio::test]
async fn a_base64_encoded_body_is_decoded_before_parsing() {
    use base64::Engine;
    let llm_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_body("hi there")))
        .mount(&llm_server)
        .await;

    let mut config = base_config();
    config.llm_endpoint_override = Some(format!("{}/mock/chat", llm_server.uri()));
    let app = build_app(config);

    let raw = json!({"query": "hello", "api_key": "sk-test", "search_mode": "direct"}).to_string();
    let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
    let request = Request::builder()
        .method("POST")
        .uri("/research")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(encoded))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn streaming_response_carries_the_required_sse_headers() {
    let llm_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_body("ignored for search mode")))
        .mount(&llm_server)
        .await;

    let search_server = MockServer::start().await;
    let html = search_results_page(&[("https://en.wikipedia.org/wiki/Rust", "Rust programming language", "Rust is a systems language")]);
    Mock::given(method("GET"))
        .and(path_regex(r"^/html/$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&search_server)
        .await;

    let mut config = base_config();
    config.llm_endpoint_override = Some(format!("{}/mock/chat", llm_server.uri()));
    config.search_endpoint_override = Some(format!("{}/html/", search_server.uri()));
    let app = build_app(config);

    let request = Request::builder()
        .method("POST")
        .uri("/research?stream=true")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"query": "what is rust?", "api_key": "sk-test", "search_mode": "search", "content": false}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/event-stream");
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-cache");
    assert_eq!(response.headers().get(header::CONNECTION).unwrap(), "keep-alive");
}
