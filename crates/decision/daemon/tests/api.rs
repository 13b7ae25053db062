use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use decision_daemon::{DaemonConfig, Server};
use serde_json::{json, Value};
use tower::ServiceExt;

const OPERATOR: &str = "root-op";
// base64 of "approve"
const APPROVE: &str = "YXBwcm92ZQ==";

fn config(operator_token: Option<&str>) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.authority.tokens = vec!["ops:alpha".to_string()];
    config.server.operator_token = operator_token.map(str::to_string);
    config
}

fn app(operator_token: Option<&str>) -> Router {
    Server::new(config(operator_token)).unwrap().app()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn operator_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-operator-token", OPERATOR)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value, operator: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = operator {
        builder = builder.header("x-operator-token", token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn decision(constraints: Value, token: &str) -> Request<Body> {
    post_json(
        "/api/v1/decisions",
        json!({ "payload": APPROVE, "constraints": constraints, "authority_token": token }),
        None,
    )
}

#[tokio::test]
async fn test_health_reports_state() {
    let app = app(None);
    let (status, body) = send(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
    assert_eq!(body["state"], "Active");
}

#[tokio::test]
async fn test_submit_commits_and_flags_absence() {
    let app = app(None);

    let (status, body) = send(&app, decision(json!({ "region": "eu" }), "ops:alpha")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "Committed");
    assert_eq!(body["sequence_number"], 1);
    assert_eq!(body["degraded_origin"], false);

    let (status, body) = send(&app, decision(json!({}), "ops:alpha")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sequence_number"], 2);
    assert_eq!(body["degraded_origin"], true);

    let (_, entries) = send(&app, get("/api/v1/ledger")).await;
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["seq"], 2);
}

#[tokio::test]
async fn test_binary_payload_is_stored_byte_exact() {
    let app = app(None);
    let request = post_json(
        "/api/v1/decisions",
        json!({ "payload": "/wD+", "constraints": { "region": "eu" }, "authority_token": "ops:alpha" }),
        None,
    );
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, entries) = send(&app, get("/api/v1/ledger")).await;
    assert_eq!(entries[0]["payload"], "/wD+");
}

#[tokio::test]
async fn test_non_base64_payload_is_refused() {
    let app = app(None);
    let request = post_json(
        "/api/v1/decisions",
        json!({ "payload": "approve!", "constraints": {}, "authority_token": "ops:alpha" }),
        None,
    );
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, entries) = send(&app, get("/api/v1/ledger")).await;
    assert!(entries.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_authority_writes_nothing() {
    let app = app(None);

    let (status, body) = send(&app, decision(json!({ "region": "eu" }), "ops:wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "Rejected");
    assert_eq!(body["reason"], "AUTHORITY_REJECTED");
    assert!(body.get("sequence_number").is_none());

    let (_, entries) = send(&app, get("/api/v1/ledger")).await;
    assert!(entries.as_array().unwrap().is_empty());
    let (_, witness) = send(&app, get("/api/v1/witness")).await;
    assert_eq!(witness["state"], "Active");
}

#[tokio::test]
async fn test_constraints_field_is_required() {
    let app = app(None);
    let request = post_json(
        "/api/v1/decisions",
        json!({ "payload": APPROVE, "authority_token": "ops:alpha" }),
        None,
    );
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_witness_detail_requires_operator() {
    let app = app(Some(OPERATOR));
    send(&app, decision(json!({ "region": "eu", "tier": "gold" }), "ops:alpha")).await;

    let (status, public) = send(&app, get("/api/v1/witness")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(public["last_sequence_number"], 1);
    assert_eq!(public["acknowledged_constraint_keys"], json!(["region", "tier"]));
    assert!(public.get("entry_count").is_none());
    assert!(public.get("degraded_origin").is_none());

    let (_, detail) = send(&app, operator_get("/api/v1/witness")).await;
    assert_eq!(detail["entry_count"], 1);
    assert_eq!(detail["degraded_origin"], false);
}

#[tokio::test]
async fn test_admin_routes_are_guarded() {
    let disabled = app(None);
    let (status, _) = send(&disabled, operator_get("/api/v1/admin/transitions")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let app = app(Some(OPERATOR));
    let (status, _) = send(&app, get("/api/v1/admin/transitions")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = post_json("/api/v1/admin/halt", json!({ "reason": "x" }), Some("guess"));
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_halt_then_reset_lands_degraded() {
    let app = app(Some(OPERATOR));

    let request = post_json(
        "/api/v1/admin/halt",
        json!({ "reason": "audit", "operator": "alice" }),
        Some(OPERATOR),
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "Halted");

    let (status, body) = send(&app, decision(json!({ "region": "eu" }), "ops:alpha")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "Halted");

    let reset = || post_json("/api/v1/admin/reset", json!({ "operator": "alice" }), Some(OPERATOR));
    let (status, body) = send(&app, reset()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "Degraded");

    let (status, _) = send(&app, reset()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, transitions) = send(&app, operator_get("/api/v1/admin/transitions")).await;
    let transitions = transitions.as_array().unwrap();
    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[0]["to"], "Halted");
    assert_eq!(transitions[1]["to"], "Degraded");
}

#[tokio::test]
async fn test_checkpoint_and_verify() {
    let app = app(Some(OPERATOR));

    let checkpoint = || post_json("/api/v1/admin/checkpoint", json!({}), Some(OPERATOR));
    let (status, _) = send(&app, checkpoint()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    for region in ["eu", "us", "apac"] {
        send(&app, decision(json!({ "region": region }), "ops:alpha")).await;
    }

    let (status, signed) = send(&app, checkpoint()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(signed["checkpoint"]["entry_count"], 3);
    assert_eq!(signed["key_id"], "decisiond");

    let (status, _) = send(&app, post_json("/api/v1/admin/verify", json!({}), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, get("/api/v1/witness/verify")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let verify = post_json("/api/v1/admin/verify", json!({}), Some(OPERATOR));
    let (status, report) = send(&app, verify).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["chain"]["valid"], true);
    assert_eq!(report["chain"]["entry_count"], 3);
    assert_eq!(report["checkpoint"]["signature_valid"], true);
    assert_eq!(report["checkpoint"]["matches_ledger"], true);
}

#[tokio::test]
async fn test_ledger_range_validation() {
    let app = app(None);
    let (status, body) = send(&app, get("/api/v1/ledger?from=5&to=2")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}
