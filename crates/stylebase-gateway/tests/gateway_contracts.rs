use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use stylebase_auth::prelude::StaticAuthenticator;
use stylebase_decode::prelude::CoordinatorConfig;
use stylebase_gateway::routes::{build_router, CORRELATION_HEADER, IDEMPOTENCY_HEADER};
use stylebase_gateway::state::AppState;
use stylebase_llm::prelude::{OpenAiConfig, OpenAiProvider, Registry};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BODY_LIMIT: usize = 1_048_576;

const HAPPY_RAW: &str = "```json\n{\"styleCodes\":[\"--sref 123\"],\"tags\":[\"minimal\"],\"subjects\":[\"shape\"],\"prompts\":{\"story\":\"a\",\"mix\":\"b\",\"expand\":\"c\",\"sound\":\"d\"}}\n```";

async fn upstream_returning(raw: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": raw } }]
        })))
        .mount(&server)
        .await;
    server
}

async fn slow_upstream(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(delay)
                .set_body_json(json!({ "choices": [] })),
        )
        .mount(&server)
        .await;
    server
}

fn router_against(upstream_uri: &str, welcome_tokens: i64, timeout: Duration) -> Router {
    let cfg = OpenAiConfig::new("test-key")
        .unwrap()
        .with_base_url(upstream_uri)
        .unwrap();
    let mut registry = Registry::new();
    registry.install_openai(Arc::new(OpenAiProvider::new(cfg).unwrap()));

    let state = AppState::from_parts(
        Arc::new(StaticAuthenticator),
        Arc::new(registry),
        welcome_tokens,
        "free".to_string(),
        CoordinatorConfig {
            cost_per_decode: 1,
            provider_timeout: timeout,
        },
    )
    .unwrap();
    build_router(state)
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

fn authed(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.header(header::AUTHORIZATION, "Bearer user-1")
}

async fn get(app: &Router, uri: &str) -> Response {
    let request = authed(Request::builder().method("GET").uri(uri))
        .body(Body::empty())
        .expect("build request");
    app.clone().oneshot(request).await.expect("router call")
}

async fn submit_decode(app: &Router, idem_key: &str) -> Response {
    let request = authed(Request::builder().method("POST").uri("/decode"))
        .header(header::CONTENT_TYPE, "application/json")
        .header(IDEMPOTENCY_HEADER, idem_key)
        .body(Body::from(
            json!({
                "image": { "base64": "aGVsbG8=", "mime": "image/png" },
                "model": "openai:gpt-4o-mini",
            })
            .to_string(),
        ))
        .expect("build request");
    app.clone().oneshot(request).await.expect("router call")
}

async fn poll_until_terminal(app: &Router, job_id: &str) -> Value {
    for _ in 0..300 {
        let response = get(app, &format!("/decode/status?id={job_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let status = body["status"].as_str().unwrap().to_string();
        if matches!(status.as_str(), "completed" | "failed" | "canceled") {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

#[tokio::test]
async fn requests_without_credentials_are_unauthenticated() {
    let upstream = upstream_returning(HAPPY_RAW).await;
    let app = router_against(&upstream.uri(), 5, Duration::from_secs(30));

    let request = Request::builder()
        .method("GET")
        .uri("/wallet/balance")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(CORRELATION_HEADER));
    let body = json_body(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["code"], "AUTH.UNAUTHENTICATED");
}

#[tokio::test]
async fn ensure_account_grants_welcome_tokens_once() {
    let upstream = upstream_returning(HAPPY_RAW).await;
    let app = router_against(&upstream.uri(), 5, Duration::from_secs(30));

    for _ in 0..3 {
        let request = authed(Request::builder().method("POST").uri("/account/ensure"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["ok"], true);
    }

    let response = get(&app, "/wallet/balance").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["balance"], 5);
    assert_eq!(body["plan"], "free");
}

#[tokio::test]
async fn decode_happy_path_completes_and_spends_one_token() {
    let upstream = upstream_returning(HAPPY_RAW).await;
    let app = router_against(&upstream.uri(), 5, Duration::from_secs(30));

    let response = submit_decode(&app, "idem-gw-happy").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(CORRELATION_HEADER));
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let done = poll_until_terminal(&app, &job_id).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["result"]["styleCodes"][0], "--sref 123");
    assert_eq!(done["result"]["tags"][0], "minimal");
    assert_eq!(done["result"]["subjects"][0], "shape");
    assert_eq!(done["result"]["prompts"]["story"], "a");

    let balance = json_body(get(&app, "/wallet/balance").await).await;
    assert_eq!(balance["balance"], 4);

    let txs = json_body(get(&app, "/wallet/transactions").await).await;
    let spends: Vec<_> = txs["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|tx| tx["kind"] == "spend")
        .collect();
    assert_eq!(spends.len(), 1);
    assert_eq!(spends[0]["reference"], "idem-gw-happy");
}

#[tokio::test]
async fn insufficient_balance_is_a_synchronous_402() {
    let upstream = upstream_returning(HAPPY_RAW).await;
    let app = router_against(&upstream.uri(), 0, Duration::from_secs(30));

    let response = submit_decode(&app, "idem-gw-broke").await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = json_body(response).await;
    assert_eq!(body["code"], "LEDGER.INSUFFICIENT_TOKENS");
    assert!(body.get("jobId").is_none());
}

#[tokio::test]
async fn missing_idempotency_key_is_rejected() {
    let upstream = upstream_returning(HAPPY_RAW).await;
    let app = router_against(&upstream.uri(), 5, Duration::from_secs(30));

    let request = authed(Request::builder().method("POST").uri("/decode"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "image": { "base64": "aGVsbG8=", "mime": "image/png" },
                "model": "openai:gpt-4o-mini",
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "SCHEMA.VALIDATION");
}

#[tokio::test]
async fn unsupported_model_is_rejected() {
    let upstream = upstream_returning(HAPPY_RAW).await;
    let app = router_against(&upstream.uri(), 5, Duration::from_secs(30));

    let request = authed(Request::builder().method("POST").uri("/decode"))
        .header(header::CONTENT_TYPE, "application/json")
        .header(IDEMPOTENCY_HEADER, "idem-gw-model")
        .body(Body::from(
            json!({
                "image": { "base64": "aGVsbG8=", "mime": "image/png" },
                "model": "claude:opus",
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "SCHEMA.VALIDATION");
}

#[tokio::test]
async fn duplicate_submissions_converge_on_one_job() {
    let upstream = upstream_returning(HAPPY_RAW).await;
    let app = router_against(&upstream.uri(), 5, Duration::from_secs(30));

    let first = json_body(submit_decode(&app, "idem-gw-dup").await).await;
    let second = json_body(submit_decode(&app, "idem-gw-dup").await).await;
    assert_eq!(first["jobId"], second["jobId"]);

    poll_until_terminal(&app, first["jobId"].as_str().unwrap()).await;

    let balance = json_body(get(&app, "/wallet/balance").await).await;
    assert_eq!(balance["balance"], 4);
}

#[tokio::test]
async fn provider_timeout_refunds_the_token() {
    let upstream = slow_upstream(Duration::from_secs(10)).await;
    let app = router_against(&upstream.uri(), 5, Duration::from_millis(100));

    let body = json_body(submit_decode(&app, "idem-gw-slow").await).await;
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let done = poll_until_terminal(&app, &job_id).await;
    assert_eq!(done["status"], "failed");
    assert!(done["error"]
        .as_str()
        .unwrap()
        .to_lowercase()
        .contains("timed out"));

    let balance = json_body(get(&app, "/wallet/balance").await).await;
    assert_eq!(balance["balance"], 5);
}

#[tokio::test]
async fn cancel_restores_the_balance() {
    let upstream = slow_upstream(Duration::from_secs(30)).await;
    let app = router_against(&upstream.uri(), 5, Duration::from_secs(60));

    let body = json_body(submit_decode(&app, "idem-gw-cancel").await).await;
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let response = get(&app, &format!("/decode/status?id={job_id}&cancel=1")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let done = poll_until_terminal(&app, &job_id).await;
    assert!(matches!(
        done["status"].as_str().unwrap(),
        "canceled" | "failed"
    ));

    let balance = json_body(get(&app, "/wallet/balance").await).await;
    assert_eq!(balance["balance"], 5);
}

#[tokio::test]
async fn jobs_are_invisible_to_other_principals() {
    let upstream = upstream_returning(HAPPY_RAW).await;
    let app = router_against(&upstream.uri(), 5, Duration::from_secs(30));

    let body = json_body(submit_decode(&app, "idem-gw-owned").await).await;
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/decode/status?id={job_id}"))
        .header(header::AUTHORIZATION, "Bearer someone-else")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "STORAGE.NOT_FOUND");
}

#[tokio::test]
async fn health_and_metrics_respond() {
    let upstream = upstream_returning(HAPPY_RAW).await;
    let app = router_against(&upstream.uri(), 5, Duration::from_secs(30));

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // a couple of requests so the counters are non-zero
    let _ = get(&app, "/wallet/balance").await;
    let response = get(&app, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["stylebase_gateway_requests_total"].as_u64().unwrap() >= 1);
}
