//! Drives the HTTP surface with `tower::ServiceExt::oneshot`, covering the
//! literal end-to-end scenarios and the peek/hybrid invariants.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use memento::blob::FsBlobStore;
use memento::config::Config;
use memento::control::ControlStore;
use memento::llm::NullLlm;
use memento::vector_backend::{NullVectorBackend, VectorBackend};
use memento::AppState;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct Harness {
    router: Router,
    _dir: TempDir,
}

async fn build_harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = Config::from_env();
    config.control_db_url = dir.path().join("control.db").to_string_lossy().to_string();
    config.control_db_token = None;
    config.workspace_db_dir = dir.path().join("workspaces").to_string_lossy().to_string();
    config.master_key = Some([7u8; 32]);

    let control = ControlStore::open(&config.control_db_url, None).await.unwrap();
    let blob_dir = dir.path().join("blobs");
    let state = Arc::new(AppState::new(
        config,
        control,
        Arc::new(NullVectorBackend),
        Arc::new(NullLlm),
        Arc::new(FsBlobStore::new(blob_dir)),
    ));
    let router = memento::http::router(state);
    Harness { router, _dir: dir }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

fn post(path: &str, api_key: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {api_key}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(path: &str, api_key: &str) -> Request<Body> {
    Request::builder().method("GET").uri(path).header("authorization", format!("Bearer {api_key}")).body(Body::empty()).unwrap()
}

async fn signup(router: &Router) -> String {
    let mut req = Request::builder()
        .method("POST")
        .uri("/auth/signup")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    req.extensions_mut().insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 0))));
    let (status, body) = send(router, req).await;
    assert_eq!(status, StatusCode::OK, "signup failed: {body:?}");
    body["api_key"].as_str().unwrap().to_string()
}

fn text_of(body: &Value) -> String {
    body["content"][0]["text"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn signup_store_recall() {
    let h = build_harness().await;
    let api_key = signup(&h.router).await;

    let (status, _) = send(
        &h.router,
        post("/memories", &api_key, json!({"content": "The MCP SDK uses zod for schema validation", "tags": ["mcp", "tech"], "type": "fact"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&h.router, get("/memories/recall?query=zod+schema", &api_key)).await;
    assert_eq!(status, StatusCode::OK);
    let text = text_of(&body);
    assert!(text.contains("Found 1"), "unexpected recall text: {text}");
    assert!(text.contains("zod"), "unexpected recall text: {text}");
}

#[tokio::test]
async fn abstention_on_unmatched_query() {
    let h = build_harness().await;
    let api_key = signup(&h.router).await;

    send(&h.router, post("/memories", &api_key, json!({"content": "alpha beta"}))).await;

    let (status, body) = send(&h.router, get("/memories/recall?query=xyzzy+nonexistent", &api_key)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text_of(&body), "No memories found.");
}

#[tokio::test]
async fn consolidation_hides_sources() {
    let h = build_harness().await;
    let api_key = signup(&h.router).await;

    for i in 0..3 {
        let (status, _) = send(
            &h.router,
            post("/memories", &api_key, json!({"content": format!("Consolidatable xyzzy item {i}"), "tags": ["consolidatable"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(&h.router, get("/memories/recall?query=xyzzy+consolidatable", &api_key)).await;
    assert!(text_of(&body).contains("Found 3"));

    let (status, _) = send(&h.router, post("/consolidate", &api_key, json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&h.router, get("/memories/recall?query=xyzzy+consolidatable", &api_key)).await;
    let text = text_of(&body);
    assert!(text.contains("Found 1"), "unexpected recall text after consolidation: {text}");
    assert!(text.contains("3 memories consolidated"), "unexpected recall text after consolidation: {text}");
}

#[tokio::test]
async fn skip_symmetry() {
    let h = build_harness().await;
    let api_key = signup(&h.router).await;

    let (status, _) = send(
        &h.router,
        post("/skip-list", &api_key, json!({"item": "vector search", "reason": "Not implementing", "expires_at": "2099-12-31T00:00:00Z"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&h.router, get("/skip-list/check?query=implement+vector+search+feature", &api_key)).await;
    assert!(body["match"].is_object() || body["match"].as_bool() == Some(true), "expected a skip match: {body:?}");

    let (_, body) = send(&h.router, get("/skip-list/check?query=keyword+matching", &api_key)).await;
    assert!(body["match"].is_null() || body["match"].as_bool() == Some(false), "expected no skip match: {body:?}");
}

#[tokio::test]
async fn peek_is_read_only() {
    let h = build_harness().await;
    let api_key = signup(&h.router).await;

    let (status, ws_body) = send(&h.router, post("/workspaces", &api_key, json!({"name": "second-workspace"}))).await;
    assert_eq!(status, StatusCode::OK);
    let second_id = ws_body["id"].as_str().unwrap().to_string();

    let second_req = Request::builder()
        .method("POST")
        .uri("/memories")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {api_key}"))
        .header("x-memento-workspace", "second-workspace")
        .body(Body::from(json!({"content": "fluid dynamics equations govern turbulent flow"}).to_string()))
        .unwrap();
    let (status, _) = send(&h.router, second_req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &h.router,
        get("/memories/recall?query=fluid+dynamics+equations&peek_workspaces=second-workspace&format=json", &api_key),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert!(results.iter().any(|r| r["workspace"] == "second-workspace"), "expected a peeked result: {body:?}");

    let list_req = Request::builder()
        .method("GET")
        .uri("/memories?status=active")
        .header("authorization", format!("Bearer {api_key}"))
        .header("x-memento-workspace", "second-workspace")
        .body(Body::empty())
        .unwrap();
    let (_, second_memories) = send(&h.router, list_req).await;
    let second_memory_id = second_memories.as_array().unwrap()[0]["id"].as_str().unwrap();
    assert_eq!(second_memory_id, second_memory_id);

    let get_req = Request::builder()
        .method("GET")
        .uri(format!("/memories/{second_memory_id}"))
        .header("authorization", format!("Bearer {api_key}"))
        .header("x-memento-workspace", "second-workspace")
        .body(Body::empty())
        .unwrap();
    let (_, fetched) = send(&h.router, get_req).await;
    assert_eq!(fetched["access_count"].as_i64().unwrap_or(0), 0, "peek must never bump access_count on the peeked workspace");

    let _ = second_id;
}

#[tokio::test]
async fn hybrid_fallback_to_keyword() {
    let h = build_harness().await;
    let api_key = signup(&h.router).await;

    send(&h.router, post("/memories", &api_key, json!({"content": "the quick brown fox jumps"}))).await;

    let (status, body) = send(&h.router, get("/memories/recall?query=quick+fox&format=json", &api_key)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ranking"], "keyword");
    let results = body["results"].as_array().unwrap();
    assert!(!results.is_empty());
    for r in results {
        assert!(r["vector_score"].is_null(), "expected no vector_score with no backend configured: {r:?}");
    }
}

struct StubVectorBackend;

#[async_trait::async_trait]
impl VectorBackend for StubVectorBackend {
    async fn index(&self, _workspace_id: &str, _memory_id: &str, _plaintext: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn search(&self, _workspace_id: &str, _query: &str, _limit: usize) -> anyhow::Result<Vec<(String, f64)>> {
        Ok(vec![("stub-match".to_string(), 0.9)])
    }

    async fn evict(&self, _workspace_id: &str, _memory_id: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn hybrid_ranking_when_vector_backend_present() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::from_env();
    config.control_db_url = dir.path().join("control.db").to_string_lossy().to_string();
    config.control_db_token = None;
    config.workspace_db_dir = dir.path().join("workspaces").to_string_lossy().to_string();
    config.master_key = Some([7u8; 32]);
    let control = ControlStore::open(&config.control_db_url, None).await.unwrap();
    let state = Arc::new(AppState::new(
        config,
        control,
        Arc::new(StubVectorBackend),
        Arc::new(NullLlm),
        Arc::new(FsBlobStore::new(dir.path().join("blobs"))),
    ));
    let router = memento::http::router(state);

    let api_key = signup(&router).await;
    let (status, create_body) = send(&router, post("/memories", &api_key, json!({"content": "the quick brown fox jumps"}))).await;
    assert_eq!(status, StatusCode::OK);
    let memory_id = create_body["id"].as_str().unwrap().to_string();

    let (status, body) = send(&router, get("/memories/recall?query=quick+fox&format=json", &api_key)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ranking"], "hybrid");
    let results = body["results"].as_array().unwrap();
    assert!(!results.is_empty());
    for r in results {
        assert!(r["keyword_score"].is_number());
        assert!(r["vector_score"].is_number());
    }
    let _ = memory_id;
}
