use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use stylebase_normalize::prelude::DecodeResult;
use tracing::debug;

use crate::backoff::RetryPolicy;
use crate::errors::ClientError;
use crate::ready::ReadyGate;
use crate::upload::DecodeUpload;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 120;

/// Supplies the bearer credential and performs the single silent
/// refresh the client is allowed on an auth failure.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String, ClientError>;
    async fn refresh(&self) -> Result<String, ClientError>;
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub retry: RetryPolicy,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct JobView {
    pub status: String,
    #[serde(default)]
    pub result: Option<DecodeResult>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobView {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "failed" | "canceled")
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct BalanceView {
    pub balance: i64,
    pub plan: String,
}

/// Submit/poll/cancel client for the decode API. All calls wait on the
/// readiness gate, carry the bearer token, and bound auth recovery to a
/// single silent refresh per logical action.
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
    tokens: Arc<dyn TokenSource>,
    ready: ReadyGate,
}

impl ApiClient {
    pub fn new(
        config: ApiConfig,
        tokens: Arc<dyn TokenSource>,
        ready: ReadyGate,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .build()
            .map_err(|err| ClientError::transport(&format!("http client build: {err}")))?;
        Ok(Self {
            http,
            config,
            tokens,
            ready,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn dispatch(&self, request: RequestBuilder) -> Result<Value, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|err| ClientError::transport(&format!("request error: {err}")))?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if body.get("ok").and_then(Value::as_bool) == Some(true) {
            return Ok(body);
        }

        let code = body
            .get("code")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| fallback_code(status).to_string());
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("Request failed.");
        Err(ClientError::api(&code, message))
    }

    /// One logical action: try with the current token, refresh exactly
    /// once on an auth failure, and give up terminally on a second.
    async fn send_authed(
        &self,
        build: &(dyn Fn(&str) -> RequestBuilder + Send + Sync),
    ) -> Result<Value, ClientError> {
        self.ready.ready().await;
        let token = self.tokens.token().await?;
        match self.dispatch(build(&token)).await {
            Err(err) if err.is_auth_failure() => {
                debug!("auth failure, attempting one silent refresh");
                let refreshed = self.tokens.refresh().await?;
                match self.dispatch(build(&refreshed)).await {
                    Err(second) if second.is_auth_failure() => {
                        Err(ClientError::reauth_required())
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    pub async fn ensure_account(&self) -> Result<(), ClientError> {
        let url = self.url("/account/ensure");
        self.config
            .retry
            .run(
                || {
                    let url = url.clone();
                    async move {
                        self.send_authed(&move |token: &str| {
                            self.http.post(&url).bearer_auth(token)
                        })
                        .await
                    }
                },
                ClientError::is_transient,
            )
            .await?;
        Ok(())
    }

    pub async fn balance(&self) -> Result<BalanceView, ClientError> {
        let url = self.url("/wallet/balance");
        let body = self
            .config
            .retry
            .run(
                || {
                    let url = url.clone();
                    async move {
                        self.send_authed(&move |token: &str| {
                            self.http.get(&url).bearer_auth(token)
                        })
                        .await
                    }
                },
                ClientError::is_transient,
            )
            .await?;
        serde_json::from_value(body)
            .map_err(|err| ClientError::transport(&format!("balance decode: {err}")))
    }

    /// Validates the upload locally, then submits and returns the job id.
    pub async fn submit_decode(
        &self,
        upload: &DecodeUpload,
        model: &str,
        idem_key: &str,
    ) -> Result<String, ClientError> {
        upload.validate()?;

        let url = self.url("/decode");
        let payload = json!({
            "image": upload.to_image_payload(),
            "model": model,
        });
        let body = self
            .send_authed(&move |token: &str| {
                self.http
                    .post(&url)
                    .bearer_auth(token)
                    .header("x-idempotency-key", idem_key)
                    .json(&payload)
            })
            .await?;

        body.get("jobId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::transport("submit response missing jobId"))
    }

    pub async fn job_status(&self, job_id: &str, cancel: bool) -> Result<JobView, ClientError> {
        let mut url = format!("{}?id={job_id}", self.url("/decode/status"));
        if cancel {
            url.push_str("&cancel=1");
        }
        let body = self
            .send_authed(&move |token: &str| self.http.get(&url).bearer_auth(token))
            .await?;
        serde_json::from_value(body)
            .map_err(|err| ClientError::transport(&format!("status decode: {err}")))
    }

    pub async fn cancel(&self, job_id: &str) -> Result<JobView, ClientError> {
        self.job_status(job_id, true).await
    }

    /// Fixed-interval polling until a terminal state, bounded by the
    /// configured attempt budget.
    pub async fn poll_to_completion(&self, job_id: &str) -> Result<JobView, ClientError> {
        for attempt in 0..self.config.max_poll_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.config.poll_interval).await;
            }
            let view = self.job_status(job_id, false).await?;
            if view.is_terminal() {
                return Ok(view);
            }
        }
        Err(ClientError::poll_exhausted(self.config.max_poll_attempts))
    }
}

fn fallback_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNAUTHORIZED => "AUTH.UNAUTHENTICATED",
        StatusCode::FORBIDDEN => "AUTH.FORBIDDEN",
        StatusCode::PAYMENT_REQUIRED => "LEDGER.INSUFFICIENT_TOKENS",
        StatusCode::NOT_FOUND => "STORAGE.NOT_FOUND",
        StatusCode::BAD_REQUEST => "SCHEMA.VALIDATION",
        _ => "PROVIDER.UNAVAILABLE",
    }
}
