//! HTTP-level tests of the payment gate.
//!
//! The gate wraps a small axum router and is driven with
//! `tower::ServiceExt::oneshot`; the facilitator is an in-memory mock that
//! counts its calls.

#![cfg(feature = "server")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower::ServiceExt;

use x402_osmosis::v1_osmosis_exact::{
    Facilitator, GateConfig, PaymentPayload, PaymentRequirements, RouteConfig, RouteTable,
    SettleResponse, SignedPayload, VerifyResponse, codec, decode_payment_response,
};
use x402_osmosis::PaymentGate;

#[derive(Clone)]
struct MockFacilitator {
    verify: VerifyResponse,
    settle: SettleResponse,
    verify_calls: Arc<AtomicUsize>,
    settle_calls: Arc<AtomicUsize>,
}

impl MockFacilitator {
    fn new(verify: VerifyResponse, settle: SettleResponse) -> Self {
        Self {
            verify,
            settle,
            verify_calls: Arc::new(AtomicUsize::new(0)),
            settle_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn accepting() -> Self {
        Self::new(
            VerifyResponse::Valid,
            SettleResponse::Success {
                tx_hash: "0xdead".into(),
                network_id: "osmo-test".into(),
            },
        )
    }

    fn calls(&self) -> (usize, usize) {
        (
            self.verify_calls.load(Ordering::SeqCst),
            self.settle_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl Facilitator for MockFacilitator {
    async fn verify(&self, _header: &str, _requirements: &PaymentRequirements) -> VerifyResponse {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verify.clone()
    }

    async fn settle(&self, _header: &str, _requirements: &PaymentRequirements) -> SettleResponse {
        self.settle_calls.fetch_add(1, Ordering::SeqCst);
        self.settle.clone()
    }
}

fn app(facilitator: MockFacilitator, recipient: Option<&str>) -> Router {
    let routes = RouteTable::from_routes([(
        "/premium",
        RouteConfig::new("1000").with_description("Premium content"),
    )])
    .unwrap();
    let mut config = GateConfig::new(routes, facilitator);
    if let Some(recipient) = recipient {
        config = config.with_recipient(recipient);
    }
    Router::new()
        .route(
            "/premium",
            get(|| async { Json(json!({"content": "premium data"})) }),
        )
        .route("/free", get(|| async { "free data" }))
        .layer(PaymentGate::new(config))
}

fn envelope(version: u64, scheme: &str) -> String {
    loose_envelope(json!(version), json!(scheme))
}

/// Envelope whose version and scheme may be any JSON value.
fn loose_envelope(version: Value, scheme: Value) -> String {
    let mut payload = PaymentPayload::exact(
        "osmo-test",
        SignedPayload::new(
            json!({"chain_id": "osmo-test-5", "memo": "x402"}),
            json!({"signature": "c2lnbmF0dXJl"}),
        ),
    );
    payload.x402_version = Some(version);
    payload.scheme = Some(scheme);
    codec::encode(&payload).unwrap()
}

struct PanickingFacilitator;

#[async_trait]
impl Facilitator for PanickingFacilitator {
    async fn verify(&self, _header: &str, _requirements: &PaymentRequirements) -> VerifyResponse {
        panic!("facilitator bug")
    }

    async fn settle(&self, _header: &str, _requirements: &PaymentRequirements) -> SettleResponse {
        panic!("facilitator bug")
    }
}

fn request(path: &str, payment: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path).header("host", "localhost:4021");
    if let Some(payment) = payment {
        builder = builder.header("x-payment", payment);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_unguarded_path_passes_through() {
    let facilitator = MockFacilitator::accepting();
    let response = app(facilitator.clone(), Some("osmo1recipient"))
        .oneshot(request("/free", Some("garbage!!")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-payment-response").is_none());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"free data");
    assert_eq!(facilitator.calls(), (0, 0));
}

#[tokio::test]
async fn test_challenge_without_payment() {
    let facilitator = MockFacilitator::accepting();
    let response = app(facilitator.clone(), Some("osmo1recipient"))
        .oneshot(request("/premium", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = json_body(response).await;
    assert_eq!(body["x402Version"], 1);
    let accepts = body["accepts"].as_array().unwrap();
    assert_eq!(accepts.len(), 1);
    assert_eq!(accepts[0]["scheme"], "exact");
    assert_eq!(accepts[0]["network"], "osmo-test");
    assert_eq!(accepts[0]["maxAmountRequired"], "1000");
    assert_eq!(accepts[0]["resource"], "http://localhost:4021/premium");
    assert_eq!(accepts[0]["description"], "Premium content");
    assert_eq!(accepts[0]["mimeType"], "application/json");
    assert_eq!(accepts[0]["payTo"], "osmo1recipient");
    assert_eq!(accepts[0]["maxTimeoutSeconds"], 300);
    assert!(accepts[0]["outputSchema"].is_null());
    assert_eq!(facilitator.calls(), (0, 0));
}

#[tokio::test]
async fn test_challenge_uses_absolute_request_uri() {
    let response = app(MockFacilitator::accepting(), Some("osmo1recipient"))
        .oneshot(request("http://paid.example/premium", None))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["accepts"][0]["resource"], "http://paid.example/premium");
}

#[tokio::test]
async fn test_missing_recipient_is_server_error() {
    let facilitator = MockFacilitator::accepting();
    let router = app(facilitator.clone(), None);

    let response = router
        .clone()
        .oneshot(request("/premium", Some(&envelope(1, "exact"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Server configuration error"})
    );

    let response = router.oneshot(request("/free", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(facilitator.calls(), (0, 0));
}

#[tokio::test]
async fn test_unsupported_version() {
    let facilitator = MockFacilitator::accepting();
    let response = app(facilitator.clone(), Some("osmo1recipient"))
        .oneshot(request("/premium", Some(&envelope(2, "exact"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Unsupported x402 version"})
    );
    assert_eq!(facilitator.calls(), (0, 0));
}

#[tokio::test]
async fn test_unsupported_scheme() {
    let facilitator = MockFacilitator::accepting();
    let response = app(facilitator.clone(), Some("osmo1recipient"))
        .oneshot(request("/premium", Some(&envelope(1, "upto"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Unsupported payment scheme"})
    );
    assert_eq!(facilitator.calls(), (0, 0));
}

#[tokio::test]
async fn test_loosely_typed_version_is_unsupported() {
    for version in [json!("1"), json!(-1), json!(2.5), json!(null), json!([1])] {
        let facilitator = MockFacilitator::accepting();
        let response = app(facilitator.clone(), Some("osmo1recipient"))
            .oneshot(request(
                "/premium",
                Some(&loose_envelope(version.clone(), json!("exact"))),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "version {version}");
        assert_eq!(
            json_body(response).await,
            json!({"error": "Unsupported x402 version"})
        );
        assert_eq!(facilitator.calls(), (0, 0));
    }
}

#[tokio::test]
async fn test_whole_float_version_is_accepted() {
    let facilitator = MockFacilitator::accepting();
    let response = app(facilitator.clone(), Some("osmo1recipient"))
        .oneshot(request(
            "/premium",
            Some(&loose_envelope(json!(1.0), json!("exact"))),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(facilitator.calls(), (1, 1));
}

#[tokio::test]
async fn test_non_string_scheme_is_unsupported() {
    let facilitator = MockFacilitator::accepting();
    let response = app(facilitator.clone(), Some("osmo1recipient"))
        .oneshot(request("/premium", Some(&loose_envelope(json!(1), json!(7)))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Unsupported payment scheme"})
    );
    assert_eq!(facilitator.calls(), (0, 0));
}

#[tokio::test]
async fn test_empty_payment_header_is_challenged() {
    let facilitator = MockFacilitator::accepting();
    let response = app(facilitator.clone(), Some("osmo1recipient"))
        .oneshot(request("/premium", Some("")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = json_body(response).await;
    assert_eq!(body["accepts"].as_array().unwrap().len(), 1);
    assert_eq!(facilitator.calls(), (0, 0));
}

#[tokio::test]
async fn test_facilitator_panic_is_processing_failure() {
    let routes = RouteTable::from_routes([("/premium", RouteConfig::new("1000"))]).unwrap();
    let gate = PaymentGate::new(
        GateConfig::new(routes, PanickingFacilitator).with_recipient("osmo1recipient"),
    );
    let router = Router::new()
        .route("/premium", get(|| async { "premium data" }))
        .layer(gate);

    let response = router
        .oneshot(request("/premium", Some(&envelope(1, "exact"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Payment processing failed");
    assert!(body["message"].as_str().unwrap().contains("verify"));
}

#[tokio::test]
async fn test_undecodable_payment_is_processing_failure() {
    let facilitator = MockFacilitator::accepting();
    let response = app(facilitator.clone(), Some("osmo1recipient"))
        .oneshot(request("/premium", Some("not-valid-base64!!!")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Payment processing failed");
    assert!(body["message"].as_str().unwrap().contains("base64"));
    assert_eq!(facilitator.calls(), (0, 0));
}

#[tokio::test]
async fn test_verification_failure_skips_settlement() {
    let facilitator = MockFacilitator::new(
        VerifyResponse::invalid("Insufficient funds"),
        SettleResponse::failed("unreachable"),
    );
    let response = app(facilitator.clone(), Some("osmo1recipient"))
        .oneshot(request("/premium", Some(&envelope(1, "exact"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Payment verification failed", "message": "Insufficient funds"})
    );
    assert_eq!(facilitator.calls(), (1, 0));
}

#[tokio::test]
async fn test_settlement_failure_withholds_resource() {
    let facilitator = MockFacilitator::new(
        VerifyResponse::Valid,
        SettleResponse::failed("Transaction failed"),
    );
    let response = app(facilitator.clone(), Some("osmo1recipient"))
        .oneshot(request("/premium", Some(&envelope(1, "exact"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert!(response.headers().get("x-payment-response").is_none());
    let body = json_body(response).await;
    assert_eq!(
        body,
        json!({"error": "Payment settlement failed", "message": "Transaction failed"})
    );
    assert!(!body.to_string().contains("premium data"));
    assert_eq!(facilitator.calls(), (1, 1));
}

#[tokio::test]
async fn test_paid_request_is_admitted() {
    let facilitator = MockFacilitator::accepting();
    let response = app(facilitator.clone(), Some("osmo1recipient"))
        .oneshot(request("/premium", Some(&envelope(1, "exact"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    let summary = decode_payment_response(
        headers
            .get("x-payment-response")
            .unwrap()
            .to_str()
            .unwrap(),
    )
    .unwrap();
    assert_eq!(summary.tx_hash, "0xdead");
    assert_eq!(summary.network, "osmo-test");
    assert!(summary.timestamp > 0);
    for name in ["x-verification-time", "x-settlement-time"] {
        let value = headers.get(name).unwrap().to_str().unwrap();
        assert!(value.parse::<u64>().is_ok(), "{name} = {value}");
    }

    assert_eq!(
        json_body(response).await,
        json!({"content": "premium data"})
    );
    assert_eq!(facilitator.calls(), (1, 1));
}

#[tokio::test]
async fn test_route_matching_is_exact() {
    let facilitator = MockFacilitator::accepting();
    let router = app(facilitator.clone(), Some("osmo1recipient"));

    // Not guarded, so the router's own 404 comes back.
    let response = router
        .clone()
        .oneshot(request("/premium/", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router.oneshot(request("/premium?x=1", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = json_body(response).await;
    assert_eq!(
        body["accepts"][0]["resource"],
        "http://localhost:4021/premium?x=1"
    );
}
