//! HTTP integration tests for the FitBot REST API
//!
//! Full handler dispatch through the Axum router with `oneshot`, backed by
//! the in-memory cache store so no database is needed.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use fitbot_core::config::{DatabaseConfig, ServiceConfig};
use fitbot_core::FitbotConfig;
use fitbot_server::http::build_router;
use fitbot_server::state::ServiceState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn make_state() -> Arc<ServiceState> {
    Arc::new(ServiceState::in_memory(FitbotConfig {
        service: ServiceConfig {
            socket_path: "/tmp/fitbot-http-test.sock".to_string(),
            log_level: "info".to_string(),
        },
        database: DatabaseConfig {
            url: "postgresql://localhost/fitbot".to_string(),
            max_connections: 1,
            connect_retries: 0,
        },
        http: Default::default(),
        versions: Default::default(),
        cache: Default::default(),
        maintenance: Default::default(),
    }))
}

async fn send(state: &Arc<ServiceState>, req: Request<Body>) -> (StatusCode, Value) {
    let resp = build_router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

const LONG_ANSWER: &str = "Creatine monohydrate at 3-5 g per day is the best studied dose. \
A loading phase of 20 g per day for a week saturates muscle stores faster but is optional.";

// ===========================================================================
// TEST 1: GET /version and GET /health
// ===========================================================================
#[tokio::test]
async fn test_version_and_health() {
    let state = make_state();

    let (status, body) = send(&state, get("/version")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["protocol"], "fitbot/1");

    let (status, body) = send(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "memory");
}

// ===========================================================================
// TEST 2: POST /classify: in scope, out of scope, tolerant spelling
// ===========================================================================
#[tokio::test]
async fn test_classify_endpoint() {
    let state = make_state();

    let (status, body) = send(&state, post("/classify", json!({"query": "Best bench-press grip?"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["in_scope"], true);
    assert_eq!(body["matched_term"], "bench press");
    assert_eq!(body["match_source"], "phrase");

    let (_, body) = send(&state, post("/classify", json!({"query": "draft a press release"}))).await;
    assert_eq!(body["in_scope"], false, "press alone is not a fitness term");

    let (_, body) = send(&state, post("/classify", json!({"query": "how do I lose weight"}))).await;
    assert_eq!(body["in_scope"], true);
    assert_eq!(body["matched_term"], "lose weight");

    let (_, body) = send(&state, post("/classify", json!({"query": "What's the capital of France?"}))).await;
    assert_eq!(body["in_scope"], false);
    assert_eq!(body["match_source"], "deferred");
    assert!(body["fallback_reply"].as_str().unwrap().contains("FitBot"));

    let (status, _) = send(&state, post("/classify", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// TEST 3: answers: store, look up paraphrase, version bump misses
// ===========================================================================
#[tokio::test]
async fn test_answer_store_and_lookup() {
    let state = make_state();

    let (status, body) = send(
        &state,
        post(
            "/answers",
            json!({
                "question": "How much creatine should I take?",
                "answer": LONG_ANSWER,
                "sources": [{"title": "ISSN position stand", "url": "https://example.com/issn"}],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], true);
    assert_eq!(body["question_hash"].as_str().unwrap().len(), 16);

    let (_, body) = send(
        &state,
        post("/answers/lookup", json!({"question": "how much creatine should i take"})),
    )
    .await;
    assert_eq!(body["hit"], true);
    assert_eq!(body["result"]["answer"], LONG_ANSWER);
    assert_eq!(body["result"]["is_stale"], false);
    assert_eq!(body["result"]["sources"][0]["url"], "https://example.com/issn");

    let (_, body) = send(
        &state,
        post(
            "/answers/lookup",
            json!({"question": "how much creatine should i take", "prompt_version": "v2.0.0"}),
        ),
    )
    .await;
    assert_eq!(body["hit"], false);
}

// ===========================================================================
// TEST 4: answers: trivial answers are not cached
// ===========================================================================
#[tokio::test]
async fn test_short_answer_skipped() {
    let state = make_state();
    let (status, body) = send(
        &state,
        post("/answers", json!({"question": "is yoga exercise", "answer": "Yes."})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], false);

    let (_, body) = send(&state, post("/answers/lookup", json!({"question": "is yoga exercise"}))).await;
    assert_eq!(body["hit"], false);
}

// ===========================================================================
// TEST 5: sources: store and look up by literal URL
// ===========================================================================
#[tokio::test]
async fn test_source_store_and_lookup() {
    let state = make_state();
    let url = "https://example.com/guides/deadlift";

    let (status, body) = send(
        &state,
        post(
            "/sources",
            json!({"url": url, "content": "Hinge at the hips.", "title": "Deadlift guide"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], true);
    assert_eq!(body["content_length"], 18);

    let (_, body) = send(&state, post("/sources/lookup", json!({"url": url}))).await;
    assert_eq!(body["hit"], true);
    assert_eq!(body["source"]["title"], "Deadlift guide");

    let (_, body) = send(&state, post("/sources/lookup", json!({"url": format!("{url}?ref=x")}))).await;
    assert_eq!(body["hit"], false);
}

// ===========================================================================
// TEST 6: GET /cache and DELETE /cache with query thresholds
// ===========================================================================
#[tokio::test]
async fn test_cache_stats_and_cleanup() {
    let state = make_state();

    for i in 0..3 {
        send(
            &state,
            post(
                "/sources",
                json!({"url": format!("https://example.com/{i}"), "content": "body"}),
            ),
        )
        .await;
    }
    send(&state, post("/sources/lookup", json!({"url": "https://example.com/2"}))).await;

    let (status, body) = send(&state, get("/cache")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scrapes"]["total"], 3);
    assert_eq!(body["scrapes"]["total_hits"], 1);
    assert_eq!(body["recent_sources"].as_array().unwrap().len(), 3);

    let req = Request::builder()
        .method("DELETE")
        .uri("/cache?max_scrape_entries=1")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Cache cleanup completed");
    assert_eq!(body["scrapes"]["size_limit"], 2);
    assert_eq!(body["scrapes"]["total"], 2);
    assert_eq!(body["answers"]["total"], 0);

    let (_, body) = send(&state, post("/sources/lookup", json!({"url": "https://example.com/2"}))).await;
    assert_eq!(body["hit"], true, "most used source survives the size limit");
}

// ===========================================================================
// TEST 7: out-of-range TTLs and negative thresholds are rejected with 400
// ===========================================================================
#[tokio::test]
async fn test_invalid_numbers_rejected() {
    let state = make_state();

    let (status, body) = send(
        &state,
        post(
            "/answers",
            json!({"question": "how long to rest", "answer": LONG_ANSWER, "ttl_days": 1_000_000_000i64}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("ttl_days"));

    let (status, _) = send(
        &state,
        post("/sources", json!({"url": "https://example.com/x", "content": "c", "ttl_days": i64::MAX})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    send(&state, post("/sources", json!({"url": "https://example.com/keep", "content": "c"}))).await;
    for uri in ["/cache?max_scrape_entries=-1", "/cache?scrape_cache_days=1000000000"] {
        let req = Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }

    let (_, body) = send(&state, get("/cache")).await;
    assert_eq!(body["scrapes"]["total"], 1);
}
