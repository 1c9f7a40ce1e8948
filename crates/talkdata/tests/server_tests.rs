//! HTTP surface tests driven through the router in-process

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower::ServiceExt;

use common::{sample_config, KeywordEmbedder, Script, ScriptedLlm, SAMPLE};
use talkdata::ingestion::ExtractorRegistry;
use talkdata::server::{state::AppState, RagServer};
use talkdata::RagConfig;

const BOUNDARY: &str = "talkdata-test-boundary";

fn app(config: RagConfig, llm: ScriptedLlm) -> (Router, AppState) {
    let pipeline = common::pipeline(&config, Arc::new(KeywordEmbedder::default()), Arc::new(llm));
    let state = AppState::from_parts(config, Arc::new(pipeline), ExtractorRegistry::with_defaults());
    (RagServer::with_state(state.clone()).build_router(), state)
}

fn router_with(llm: ScriptedLlm) -> Router {
    app(sample_config(), llm).0
}

fn router() -> Router {
    router_with(ScriptedLlm::replying("Bob likes oranges [1]."))
}

fn multipart(files: &[(&str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (filename, content) in files {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::post("/api/sessions")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn post_json(uri: &str, value: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

#[tokio::test]
async fn health_ready_and_info() {
    let router = router();

    let (status, body) = send(&router, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".into()));

    let (status, _) = send(&router, Request::get("/ready").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, info) = send(&router, Request::get("/api/info").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["name"], "talkdata");
    assert_eq!(info["models"]["chat"], "scripted-model");
    assert_eq!(info["chunking"]["chunk_size"], 20);
}

#[tokio::test]
async fn inline_answer_returns_citations_and_linked_html() {
    let router = router();

    let (status, body) = send(
        &router,
        post_json("/api/answer", json!({"document_text": SAMPLE, "question": "What does Bob like?"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Bob likes oranges [1].");
    assert!(body["citations"]["1"]["excerpt"]
        .as_str()
        .unwrap()
        .contains("Bob likes oranges"));
    assert_eq!(
        body["answer_html"],
        "Bob likes oranges <span class='citation-ref'>[1]</span>."
    );
    assert_eq!(body["context_size"], 3);
}

#[tokio::test]
async fn inline_answer_on_empty_document_is_unprocessable() {
    let router = router();

    let (status, body) = send(
        &router,
        post_json("/api/answer", json!({"document_text": "", "question": "Anything?"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["type"], "empty_document");
    assert_eq!(body["error"]["retryable"], false);
}

#[tokio::test]
async fn session_lifecycle() {
    let router = router();

    let (status, created) = send(
        &router,
        multipart(&[
            ("fruit.txt", SAMPLE),
            ("archive.zip", "PK"),
            ("more.csv", "Dave,grapes"),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let session_id = created["session_id"].as_str().unwrap().to_string();
    assert_eq!(created["accepted"].as_array().unwrap().len(), 2);
    assert_eq!(created["skipped"][0]["filename"], "archive.zip");
    assert!(created["characters"].as_u64().unwrap() > SAMPLE.len() as u64);

    let questions = format!("/api/sessions/{session_id}/questions");
    let (status, answer) = send(&router, post_json(&questions, json!({"question": "What does Bob like?"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answer["citations"]["1"]["filename"], "fruit.txt");

    let delete = Request::delete(format!("/api/sessions/{session_id}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&router, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&router, post_json(&questions, json!({"question": "Again?"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found");
}

#[tokio::test]
async fn batch_with_no_text_opens_no_session() {
    let router = router();

    let (status, created) = send(&router, multipart(&[("blank.txt", "   "), ("x.zip", "PK")])).await;

    assert_eq!(status, StatusCode::OK);
    assert!(created["session_id"].is_null());
    assert!(created["accepted"].as_array().unwrap().is_empty());
    assert_eq!(created["skipped"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn upload_without_files_is_rejected() {
    let router = router();

    let (status, body) = send(&router, multipart(&[])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request");
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let router = router();
    let uri = format!("/api/sessions/{}/questions", uuid::Uuid::new_v4());

    let (status, _) = send(&router, post_json(&uri, json!({"question": "Hello?"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn generation_timeout_maps_to_gateway_timeout() {
    let router = router_with(ScriptedLlm::new(Script::Hang));

    let (status, body) = send(
        &router,
        post_json("/api/answer", json!({"document_text": SAMPLE, "question": "What does Bob like?"})),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["type"], "generation_unavailable");
    assert_eq!(body["error"]["retryable"], true);
}

async fn open_session(router: &Router, content: &str) -> String {
    let (status, created) = send(router, multipart(&[("notes.txt", content)])).await;
    assert_eq!(status, StatusCode::OK);
    created["session_id"].as_str().unwrap().to_string()
}

async fn ask(router: &Router, session_id: &str) -> StatusCode {
    let uri = format!("/api/sessions/{session_id}/questions");
    send(router, post_json(&uri, json!({"question": "What does Bob like?"}))).await.0
}

#[tokio::test(start_paused = true)]
async fn idle_sessions_expire_and_questions_keep_them_alive() {
    let mut config = sample_config();
    config.server.session_ttl_secs = 60;
    let (router, state) = app(config, ScriptedLlm::replying("Bob likes oranges [1]."));

    let idle = open_session(&router, SAMPLE).await;
    let active = open_session(&router, "Dave likes grapes.").await;

    tokio::time::advance(Duration::from_secs(45)).await;
    assert_eq!(ask(&router, &active).await, StatusCode::OK);
    tokio::time::advance(Duration::from_secs(30)).await;

    let expired = state.expire_sessions(Instant::now()).await;
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].to_string(), idle);
    assert_eq!(ask(&router, &idle).await, StatusCode::NOT_FOUND);
    assert_eq!(ask(&router, &active).await, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn zero_ttl_keeps_sessions_until_deleted() {
    let mut config = sample_config();
    config.server.session_ttl_secs = 0;
    let (router, state) = app(config, ScriptedLlm::replying("[1]"));

    let session = open_session(&router, SAMPLE).await;
    tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;

    assert!(state.expire_sessions(Instant::now()).await.is_empty());
    assert_eq!(ask(&router, &session).await, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn session_limit_ends_the_least_recently_used() {
    let mut config = sample_config();
    config.server.max_sessions = 2;
    let (router, state) = app(config, ScriptedLlm::replying("[1]"));

    let first = open_session(&router, SAMPLE).await;
    tokio::time::advance(Duration::from_secs(1)).await;
    let second = open_session(&router, "Dave likes grapes.").await;
    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(ask(&router, &first).await, StatusCode::OK);

    let third = open_session(&router, "Erin likes plums.").await;

    assert_eq!(state.session_count(), 2);
    assert_eq!(ask(&router, &second).await, StatusCode::NOT_FOUND);
    assert_eq!(ask(&router, &first).await, StatusCode::OK);
    assert_eq!(ask(&router, &third).await, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn sweeper_expires_sessions_on_its_interval() {
    let mut config = sample_config();
    config.server.session_ttl_secs = 30;
    config.server.session_sweep_secs = 10;
    let (router, state) = app(config, ScriptedLlm::replying("[1]"));
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let sweeper = state.spawn_session_sweeper(stop_rx);

    let session = open_session(&router, SAMPLE).await;
    assert_eq!(ask(&router, &session).await, StatusCode::OK);

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(state.session_count(), 1);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(state.session_count(), 0);
    assert_eq!(ask(&router, &session).await, StatusCode::NOT_FOUND);

    stop_tx.send(true).unwrap();
    sweeper.await.unwrap();
}
