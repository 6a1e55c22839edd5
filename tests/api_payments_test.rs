//! HTTP surface tests driven through the router with `oneshot`

mod common;

use airpay_backend::api::create_router;
use airpay_backend::payments::error::PaymentError;
use airpay_backend::payments::types::GatewayKind;
use airpay_backend::workers::payment_jobs::PaymentJobWorker;
use axum::http::{Request, StatusCode};
use axum::{body::Body, Router};
use common::{app_state, payment_service, queue, valid_request, RecordingStore, ScriptedGateway};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower::util::ServiceExt;

fn app_with(gateway: Arc<ScriptedGateway>, store: Arc<RecordingStore>) -> Router {
    let (jobs, _receiver, tracker) = queue(8);
    create_router(app_state(payment_service(gateway, store), jobs, tracker))
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn request_json(reference_id: &str) -> Value {
    serde_json::to_value(valid_request(reference_id)).unwrap()
}

#[tokio::test]
async fn sync_create_returns_persisted_payment() {
    let gateway = ScriptedGateway::ok(GatewayKind::Xendit, "pr-200", "REQUIRES_ACTION");
    let store = Arc::new(RecordingStore::default());
    let app = app_with(gateway.clone(), store.clone());

    let response = app
        .oneshot(post_json("/payment/xendit", &request_json("INV-200")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert_eq!(body["payment_request_id"], "pr-200");
    assert_eq!(body["reference_id"], "INV-200");
    assert_eq!(store.saved(), vec!["pr-200".to_string()]);
}

#[tokio::test]
async fn incoming_request_id_is_propagated() {
    let gateway = ScriptedGateway::ok(GatewayKind::Xendit, "pr-201", "PENDING");
    let app = app_with(gateway, Arc::new(RecordingStore::default()));

    let mut request = get("/health");
    request
        .headers_mut()
        .insert("x-request-id", "trace-abc".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "trace-abc");
}

#[tokio::test]
async fn invalid_request_is_rejected_before_gateway() {
    let gateway = ScriptedGateway::ok(GatewayKind::Xendit, "pr-202", "PENDING");
    let app = app_with(gateway.clone(), Arc::new(RecordingStore::default()));

    let mut body = request_json("INV-202");
    body["request_amount"] = serde_json::json!(0);

    let response = app
        .oneshot(post_json("/payment/xendit", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert_eq!(body["retryable"], false);
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let gateway = ScriptedGateway::ok(GatewayKind::Xendit, "pr-203", "PENDING");
    let app = app_with(gateway.clone(), Arc::new(RecordingStore::default()));

    let request = Request::builder()
        .method("POST")
        .uri("/payment/xendit")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn unknown_or_disabled_gateway_is_bad_request() {
    let gateway = ScriptedGateway::ok(GatewayKind::Xendit, "pr-204", "PENDING");
    let app = app_with(gateway, Arc::new(RecordingStore::default()));

    let response = app
        .clone()
        .oneshot(post_json("/payment/paypal", &request_json("INV-204")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post_json("/payment/nicepay", &request_json("INV-204")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn gateway_error_is_forwarded_verbatim() {
    let upstream = r#"{"error_code":"API_VALIDATION_ERROR","message":"Invalid channel_code"}"#;
    let gateway = ScriptedGateway::failing(
        GatewayKind::Xendit,
        PaymentError::GatewayResponse {
            gateway: "xendit".to_string(),
            status: 400,
            body: upstream.as_bytes().to_vec(),
        },
    );
    let store = Arc::new(RecordingStore::default());
    let app = app_with(gateway, store.clone());

    let response = app
        .oneshot(post_json("/payment/xendit", &request_json("INV-205")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_bytes(response).await, upstream.as_bytes());
    assert!(store.saved().is_empty());
}

#[tokio::test]
async fn gateway_timeout_maps_to_504() {
    let gateway = ScriptedGateway::failing(
        GatewayKind::Xendit,
        PaymentError::TimeoutError {
            gateway: "xendit".to_string(),
            timeout_ms: 30_000,
        },
    );
    let app = app_with(gateway, Arc::new(RecordingStore::default()));

    let response = app
        .oneshot(post_json("/payment/xendit", &request_json("INV-206")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "EXTERNAL_SERVICE_TIMEOUT");
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn transport_error_maps_to_502() {
    let gateway = ScriptedGateway::failing(
        GatewayKind::Xendit,
        PaymentError::NetworkError {
            message: "connection refused".to_string(),
        },
    );
    let app = app_with(gateway, Arc::new(RecordingStore::default()));

    let response = app
        .oneshot(post_json("/payment/xendit", &request_json("INV-207")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn persistence_failure_maps_to_500() {
    let gateway = ScriptedGateway::ok(GatewayKind::Xendit, "pr-208", "PENDING");
    let app = app_with(gateway, RecordingStore::failing());

    let response = app
        .oneshot(post_json("/payment/xendit", &request_json("INV-208")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "DATABASE_ERROR");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn async_create_is_accepted_and_completes() {
    let gateway = ScriptedGateway::ok(GatewayKind::Xendit, "pr-300", "PENDING");
    let store = Arc::new(RecordingStore::default());
    let (jobs, receiver, tracker) = queue(8);
    let payments = payment_service(gateway, store);

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = PaymentJobWorker::new(receiver, tracker.clone(), payments.clone());
    tokio::spawn(worker.run(shutdown_rx));

    let app = create_router(app_state(payments, jobs, tracker));

    let response = app
        .clone()
        .oneshot(post_json("/payment/xendit/async", &request_json("INV-300")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted = body_json(response).await;
    assert_eq!(accepted["status"], "queued");
    let job_id = accepted["job_id"].as_str().unwrap().to_string();

    let mut job = Value::Null;
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(get(&format!("/jobs/status?id={}", job_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        job = body_json(response).await;
        if job["status"] == "done" || job["status"] == "error" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(job["status"], "done");
    assert_eq!(job["id"], job_id.as_str());
    assert_eq!(job["gateway"], "xendit");
    assert_eq!(job["data"]["payment_request_id"], "pr-300");
}

#[tokio::test]
async fn async_create_validates_before_queueing() {
    let gateway = ScriptedGateway::ok(GatewayKind::Xendit, "pr-301", "PENDING");
    let (jobs, _receiver, tracker) = queue(8);
    let app = create_router(app_state(
        payment_service(gateway, Arc::new(RecordingStore::default())),
        jobs,
        tracker.clone(),
    ));

    let mut body = request_json("INV-301");
    body["currency"] = serde_json::json!("");
    let response = app
        .oneshot(post_json("/payment/xendit/async", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(tracker.is_empty().await);
}

#[tokio::test]
async fn job_status_requires_id() {
    let gateway = ScriptedGateway::ok(GatewayKind::Xendit, "pr-302", "PENDING");
    let app = app_with(gateway, Arc::new(RecordingStore::default()));

    let response = app.clone().oneshot(get("/jobs/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.oneshot(get("/jobs/status?id=")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_job_is_404() {
    let gateway = ScriptedGateway::ok(GatewayKind::Xendit, "pr-303", "PENDING");
    let app = app_with(gateway, Arc::new(RecordingStore::default()));

    let response = app
        .oneshot(get("/jobs/status?id=0b0e5d1c-missing"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "JOB_NOT_FOUND");
}

#[tokio::test]
async fn health_reports_degraded_without_database() {
    let gateway = ScriptedGateway::ok(GatewayKind::Xendit, "pr-304", "PENDING");
    let app = app_with(gateway, Arc::new(RecordingStore::default()));

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "Degraded");
    assert_eq!(body["checks"]["database"]["status"], "Warning");
}
