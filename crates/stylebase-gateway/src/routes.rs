use std::time::Instant;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use stylebase_decode::prelude::DecodeJob;
use stylebase_errors::prelude::ErrorObj;
use stylebase_llm::prelude::{ImageSource, ModelId};
use stylebase_observe::prelude::{Meter, MetricKind, MetricSpec};
use stylebase_types::prelude::{CorrelationId, Id, ResolvedPrincipal};
use tracing::info;

use crate::state::AppState;

pub const CORRELATION_HEADER: &str = "x-correlation-id";
pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

const HTTP_REQUESTS_TOTAL: MetricSpec = MetricSpec {
    name: "stylebase_gateway_requests_total",
    kind: MetricKind::Counter,
    help: "Total HTTP requests handled by the gateway",
};

const HTTP_ERRORS_TOTAL: MetricSpec = MetricSpec {
    name: "stylebase_gateway_errors_total",
    kind: MetricKind::Counter,
    help: "Total HTTP requests answered with a 4xx or 5xx",
};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/account/ensure", post(account_ensure))
        .route("/wallet/balance", get(wallet_balance))
        .route("/wallet/transactions", get(wallet_transactions))
        .route("/decode", post(decode_submit))
        .route("/decode/status", get(decode_status))
        .layer(from_fn_with_state(state.clone(), stamp_middleware))
        .with_state(state)
}

/// Stamps every response with a correlation id and records request
/// metrics, including responses produced by error paths.
async fn stamp_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let correlation = CorrelationId::new_random();
    let started = Instant::now();

    let mut response = next.run(req).await;

    let status = response.status();
    state.meter.counter(&HTTP_REQUESTS_TOTAL).inc(1);
    if status.is_client_error() || status.is_server_error() {
        state.meter.counter(&HTTP_ERRORS_TOTAL).inc(1);
    }

    response.headers_mut().insert(
        CORRELATION_HEADER,
        HeaderValue::from_str(&correlation.0)
            .unwrap_or_else(|_| HeaderValue::from_static("req_invalid")),
    );

    info!(
        target: "stylebase_gateway::access",
        %path,
        status = status.as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        correlation = %correlation,
        "request handled"
    );
    response
}

fn error_response(obj: &ErrorObj) -> Response {
    let status =
        StatusCode::from_u16(obj.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let view = obj.to_public();
    (
        status,
        Json(json!({
            "ok": false,
            "error": view.message,
            "code": view.code,
        })),
    )
        .into_response()
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "ok": false,
            "error": message,
            "code": "SCHEMA.VALIDATION",
        })),
    )
        .into_response()
}

async fn resolve_principal(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<ResolvedPrincipal, Response> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    state
        .auth
        .resolve(bearer)
        .await
        .map_err(|err| error_response(&err.into_inner()))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let counters: serde_json::Map<String, serde_json::Value> = state
        .meter
        .snapshot()
        .into_iter()
        .map(|(name, value)| (name.to_string(), json!(value)))
        .collect();
    Json(serde_json::Value::Object(counters))
}

async fn account_ensure(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match resolve_principal(&state, &headers).await {
        Ok(_) => Json(json!({ "ok": true })).into_response(),
        Err(response) => response,
    }
}

async fn wallet_balance(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let principal = match resolve_principal(&state, &headers).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match state.ledger.entitlement(&principal.principal_id).await {
        Ok(Some(entitlement)) => Json(json!({
            "ok": true,
            "balance": entitlement.tokens_balance,
            "plan": entitlement.plan,
        }))
        .into_response(),
        Ok(None) => Json(json!({
            "ok": true,
            "balance": 0,
            "plan": "free",
        }))
        .into_response(),
        Err(err) => error_response(&err.into_inner()),
    }
}

#[derive(Deserialize)]
struct TransactionsQuery {
    #[serde(default = "TransactionsQuery::default_limit")]
    limit: usize,
}

impl TransactionsQuery {
    fn default_limit() -> usize {
        50
    }
}

async fn wallet_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionsQuery>,
    headers: HeaderMap,
) -> Response {
    let principal = match resolve_principal(&state, &headers).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match state
        .ledger
        .transactions(&principal.principal_id, query.limit.min(500))
        .await
    {
        Ok(transactions) => {
            let items: Vec<_> = transactions
                .into_iter()
                .map(|tx| {
                    json!({
                        "kind": tx.kind.as_str(),
                        "amount": tx.amount,
                        "reference": tx.reference,
                        "createdAt": tx.created_at.to_rfc3339(),
                    })
                })
                .collect();
            Json(json!({ "ok": true, "transactions": items })).into_response()
        }
        Err(err) => error_response(&err.into_inner()),
    }
}

#[derive(Deserialize)]
struct DecodePayload {
    image: ImageSource,
    model: String,
}

async fn decode_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<DecodePayload>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let principal = match resolve_principal(&state, &headers).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let Json(payload) = match body {
        Ok(json) => json,
        Err(rejection) => return bad_request(&format!("invalid request body: {rejection}")),
    };

    let Some(idem_key) = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
    else {
        return bad_request("x-idempotency-key header is required");
    };

    let model = match ModelId::parse(&payload.model) {
        Ok(model) => model,
        Err(err) => return error_response(&err.into_inner()),
    };

    match state
        .coordinator
        .submit(&principal.principal_id, payload.image, model, idem_key)
        .await
    {
        Ok(job) => Json(json!({ "ok": true, "jobId": job.id.0 })).into_response(),
        Err(err) => error_response(&err.into_inner()),
    }
}

#[derive(Deserialize)]
struct StatusQuery {
    id: String,
    #[serde(default)]
    cancel: Option<String>,
}

async fn decode_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
    headers: HeaderMap,
) -> Response {
    let principal = match resolve_principal(&state, &headers).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let cancel = matches!(query.cancel.as_deref(), Some("1") | Some("true"));
    let job_id = Id(query.id);

    match state
        .coordinator
        .status(&principal.principal_id, &job_id, cancel)
        .await
    {
        Ok(job) => job_response(&job),
        Err(err) => error_response(&err.into_inner()),
    }
}

fn job_response(job: &DecodeJob) -> Response {
    let mut body = json!({
        "ok": true,
        "jobId": job.id.0,
        "status": job.status.as_str(),
    });
    if let Some(result) = &job.result {
        body["result"] = serde_json::to_value(result).unwrap_or(serde_json::Value::Null);
    }
    if let Some(error) = &job.error {
        body["error"] = json!(error);
    }
    Json(body).into_response()
}
