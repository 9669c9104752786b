use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use stylebase_client::prelude::*;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FakeTokens {
    current: Mutex<String>,
    refreshed: String,
    refreshes: AtomicUsize,
}

impl FakeTokens {
    fn new(initial: &str, refreshed: &str) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(initial.to_string()),
            refreshed: refreshed.to_string(),
            refreshes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TokenSource for FakeTokens {
    async fn token(&self) -> Result<String, ClientError> {
        Ok(self.current.lock().clone())
    }

    async fn refresh(&self) -> Result<String, ClientError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let mut current = self.current.lock();
        *current = self.refreshed.clone();
        Ok(current.clone())
    }
}

fn client(server: &MockServer, tokens: Arc<FakeTokens>) -> ApiClient {
    let mut config = ApiConfig::new(server.uri());
    config.poll_interval = Duration::from_millis(5);
    config.retry = RetryPolicy {
        max_attempts: 1,
        ..RetryPolicy::default()
    };
    ApiClient::new(config, tokens, ReadyGate::open()).unwrap()
}

fn unauthorized() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({
        "ok": false,
        "error": "Please sign in again.",
        "code": "AUTH.UNAUTHENTICATED",
    }))
}

#[tokio::test]
async fn auth_failure_triggers_exactly_one_silent_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wallet/balance"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(unauthorized())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wallet/balance"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "balance": 4,
            "plan": "free",
        })))
        .mount(&server)
        .await;

    let tokens = FakeTokens::new("stale", "fresh");
    let api = client(&server, tokens.clone());

    let view = api.balance().await.unwrap();
    assert_eq!(view.balance, 4);
    assert_eq!(view.plan, "free");
    assert_eq!(tokens.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_consecutive_auth_failure_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wallet/balance"))
        .respond_with(unauthorized())
        .expect(2)
        .mount(&server)
        .await;

    let tokens = FakeTokens::new("stale", "still-stale");
    let api = client(&server, tokens.clone());

    let err = api.balance().await.unwrap_err();
    assert!(err.is_auth_failure());
    assert!(err
        .obj()
        .message_user
        .contains("sign out and back in"));
    assert_eq!(tokens.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn submit_then_poll_reaches_completed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/decode"))
        .and(header("x-idempotency-key", "key-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "jobId": "job_abc",
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/decode/status"))
        .and(query_param("id", "job_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "status": "running",
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/decode/status"))
        .and(query_param("id", "job_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "status": "completed",
            "result": {
                "styleCodes": ["--sref 123"],
                "tags": ["minimal"],
                "subjects": ["shape"],
                "prompts": {"story": "a", "mix": "b", "expand": "c", "sound": "d"}
            },
        })))
        .mount(&server)
        .await;

    let api = client(&server, FakeTokens::new("good", "good"));
    let upload = DecodeUpload::new(vec![0u8; 64], "image/png");
    let job_id = api
        .submit_decode(&upload, "openai:gpt-4o-mini", "key-1")
        .await
        .unwrap();
    assert_eq!(job_id, "job_abc");

    let view = api.poll_to_completion(&job_id).await.unwrap();
    assert_eq!(view.status, "completed");
    let result = view.result.unwrap();
    assert_eq!(result.style_codes, vec!["--sref 123"]);
    assert_eq!(result.prompts.sound, "d");
}

#[tokio::test]
async fn polling_gives_up_after_the_attempt_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/decode/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "status": "running",
        })))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = ApiConfig::new(server.uri());
    config.poll_interval = Duration::from_millis(1);
    config.max_poll_attempts = 3;
    let api = ApiClient::new(config, FakeTokens::new("good", "good"), ReadyGate::open()).unwrap();

    let err = api.poll_to_completion("job_slow").await.unwrap_err();
    assert_eq!(err.code(), "PROVIDER.TIMEOUT");
}

#[tokio::test]
async fn cancel_sends_the_cancel_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/decode/status"))
        .and(query_param("id", "job_x"))
        .and(query_param("cancel", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "status": "canceled",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, FakeTokens::new("good", "good"));
    let view = api.cancel("job_x").await.unwrap();
    assert_eq!(view.status, "canceled");
    assert!(view.is_terminal());
}

#[tokio::test]
async fn insufficient_tokens_code_is_preserved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/decode"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "ok": false,
            "error": "Not enough tokens for this action.",
            "code": "LEDGER.INSUFFICIENT_TOKENS",
        })))
        .mount(&server)
        .await;

    let api = client(&server, FakeTokens::new("good", "good"));
    let upload = DecodeUpload::new(vec![0u8; 16], "image/jpeg");
    let err = api
        .submit_decode(&upload, "openai:gpt-4o-mini", "key-2")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "LEDGER.INSUFFICIENT_TOKENS");
}

#[tokio::test]
async fn invalid_upload_never_hits_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/decode"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let api = client(&server, FakeTokens::new("good", "good"));
    let upload = DecodeUpload::new(vec![0u8; 16], "image/gif");
    let err = api
        .submit_decode(&upload, "openai:gpt-4o-mini", "key-3")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "SCHEMA.VALIDATION");
}
