//! The payment gate: per-request state machine in front of guarded routes.
//!
//! For each request the gate decides one of three things:
//!
//! - **Passthrough**: the path is not guarded; the request is untouched
//! - **Reject**: answer with an error status and JSON body, the handler never runs
//! - **Admit**: the payment verified and settled; run the handler and attach
//!   the settlement headers to its response
//!
//! Guarded requests go through these steps in order, and settlement never
//! starts unless verification succeeded:
//!
//! 1. recipient configured, else 500
//! 2. `X-PAYMENT` present and not blank, else 402 with the requirements
//! 3. envelope decodes, else 500
//! 4. version is 1, else 400
//! 5. scheme is `exact`, else 400
//! 6. facilitator verifies, else 403
//! 7. facilitator settles, else 402

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::http::header::{HOST, InvalidHeaderValue};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use serde_json::json;

use crate::v1_osmosis_exact::codec::{self, EnvelopeDecodeError, EnvelopeEncodeError};
use crate::v1_osmosis_exact::facilitator::Facilitator;
use crate::v1_osmosis_exact::server::RouteTable;
use crate::v1_osmosis_exact::types::{
    ExactScheme, PaymentRequired, PaymentRequirements, PaymentResponseHeader, SettleResponse,
    VerifyResponse,
};
use crate::v1_osmosis_exact::{
    V1OsmosisExact, X402_VERSION, X_PAYMENT_RESPONSE, X_SETTLEMENT_TIME, X_VERIFICATION_TIME,
};

/// Unexpected failure while processing a presented payment.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("X-PAYMENT header is not valid UTF-8")]
    HeaderEncoding(#[from] std::str::Utf8Error),
    #[error(transparent)]
    Decode(#[from] EnvelopeDecodeError),
    #[error(transparent)]
    Encode(#[from] EnvelopeEncodeError),
    #[error("invalid response header value: {0}")]
    ResponseHeader(#[from] InvalidHeaderValue),
    #[error("facilitator panicked during {0}")]
    FacilitatorPanic(&'static str),
}

/// Settings of a [`PaymentGate`].
#[derive(Clone)]
pub struct GateConfig {
    /// Address receiving payments. Guarded requests fail with 500 without it.
    pub recipient_address: Option<String>,
    pub routes: RouteTable,
    pub facilitator: Arc<dyn Facilitator>,
    /// Origin used to build resource URLs when the request URI is relative.
    pub public_base_url: Option<String>,
}

impl GateConfig {
    pub fn new(routes: RouteTable, facilitator: impl Facilitator + 'static) -> Self {
        Self {
            recipient_address: None,
            routes,
            facilitator: Arc::new(facilitator),
            public_base_url: None,
        }
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient_address = Some(recipient.into()).filter(|r: &String| !r.is_empty());
        self
    }

    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.public_base_url = Some(base_url.into()).filter(|u: &String| !u.is_empty());
        self
    }
}

impl std::fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateConfig")
            .field("recipient_address", &self.recipient_address)
            .field("routes", &self.routes)
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

/// What the gate decided for one request.
#[derive(Debug)]
pub enum GateDecision {
    Passthrough,
    Reject(GateRejection),
    Admit(Admission),
}

/// A settled payment, ready to be reported on the handler's response.
#[derive(Debug, Clone)]
pub struct Admission {
    pub settlement: PaymentResponseHeader,
    /// Verification round trip in milliseconds.
    pub verification_ms: u64,
    /// Settlement round trip in milliseconds.
    pub settlement_ms: u64,
    payment_response: HeaderValue,
}

impl Admission {
    /// The encoded `X-Payment-Response` value.
    pub fn payment_response(&self) -> &HeaderValue {
        &self.payment_response
    }

    /// Adds the settlement headers to a response.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(
            HeaderName::from_static(X_PAYMENT_RESPONSE),
            self.payment_response.clone(),
        );
        headers.insert(
            HeaderName::from_static(X_VERIFICATION_TIME),
            HeaderValue::from(self.verification_ms),
        );
        headers.insert(
            HeaderName::from_static(X_SETTLEMENT_TIME),
            HeaderValue::from(self.settlement_ms),
        );
    }
}

/// A request the gate answers itself.
#[derive(Debug)]
pub enum GateRejection {
    MissingRecipient,
    PaymentRequired(PaymentRequired),
    /// The presented `x402Version`, as sent.
    UnsupportedVersion(Option<serde_json::Value>),
    /// The presented `scheme`, as sent.
    UnsupportedScheme(Option<serde_json::Value>),
    VerificationFailed(String),
    SettlementFailed(String),
    ProcessingFailed(GateError),
}

impl GateRejection {
    /// Short label for log fields.
    pub fn code(&self) -> &'static str {
        match self {
            GateRejection::MissingRecipient => "missing_recipient",
            GateRejection::PaymentRequired(_) => "payment_required",
            GateRejection::UnsupportedVersion(_) => "unsupported_version",
            GateRejection::UnsupportedScheme(_) => "unsupported_scheme",
            GateRejection::VerificationFailed(_) => "verification_failed",
            GateRejection::SettlementFailed(_) => "settlement_failed",
            GateRejection::ProcessingFailed(_) => "processing_failed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GateRejection::MissingRecipient | GateRejection::ProcessingFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GateRejection::PaymentRequired(_) | GateRejection::SettlementFailed(_) => {
                StatusCode::PAYMENT_REQUIRED
            }
            GateRejection::UnsupportedVersion(_) | GateRejection::UnsupportedScheme(_) => {
                StatusCode::BAD_REQUEST
            }
            GateRejection::VerificationFailed(_) => StatusCode::FORBIDDEN,
        }
    }

    /// JSON body sent to the client.
    pub fn body(&self) -> serde_json::Value {
        match self {
            GateRejection::MissingRecipient => json!({"error": "Server configuration error"}),
            GateRejection::PaymentRequired(challenge) => {
                serde_json::to_value(challenge).unwrap_or_else(|_| json!({}))
            }
            GateRejection::UnsupportedVersion(_) => json!({"error": "Unsupported x402 version"}),
            GateRejection::UnsupportedScheme(_) => json!({"error": "Unsupported payment scheme"}),
            GateRejection::VerificationFailed(reason) => json!({
                "error": "Payment verification failed",
                "message": reason,
            }),
            GateRejection::SettlementFailed(reason) => json!({
                "error": "Payment settlement failed",
                "message": reason,
            }),
            GateRejection::ProcessingFailed(e) => json!({
                "error": "Payment processing failed",
                "message": e.to_string(),
            }),
        }
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// The x402 payment gate.
///
/// Cheap to clone; all clones share one configuration. Use it directly with
/// [`PaymentGate::evaluate`] or as a tower layer.
#[derive(Debug, Clone)]
pub struct PaymentGate {
    config: Arc<GateConfig>,
}

impl PaymentGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Whether requests to `path` require payment.
    pub fn guards(&self, path: &str) -> bool {
        self.config.routes.contains(path)
    }

    /// Absolute URL identifying the requested resource.
    ///
    /// An absolute request URI is used as is. Otherwise the path and query
    /// are joined to the public base URL, or to `http://` plus the `Host`
    /// header.
    pub fn resource_url(&self, uri: &Uri, headers: &HeaderMap) -> String {
        if uri.scheme().is_some() && uri.authority().is_some() {
            return uri.to_string();
        }
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        if let Some(base) = self.config.public_base_url.as_deref() {
            return format!("{}{}", base.trim_end_matches('/'), path_and_query);
        }
        let host = headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        format!("http://{host}{path_and_query}")
    }

    /// Runs the gate for one request.
    ///
    /// `payment_header` is the raw `X-PAYMENT` value, if any. A blank value
    /// counts as no payment.
    pub async fn evaluate(
        &self,
        path: &str,
        resource: &str,
        payment_header: Option<&[u8]>,
    ) -> GateDecision {
        let Some(route) = self.config.routes.get(path) else {
            return GateDecision::Passthrough;
        };

        let Some(pay_to) = self.config.recipient_address.as_deref() else {
            tracing::error!(path, "No recipient address configured");
            return GateDecision::Reject(GateRejection::MissingRecipient);
        };

        let requirements = V1OsmosisExact::requirements(route, pay_to, resource);

        let payment_header =
            payment_header.filter(|h| !h.iter().all(u8::is_ascii_whitespace));
        let Some(payment_header) = payment_header else {
            tracing::debug!(path, price = %requirements.max_amount_required, "Payment required");
            return GateDecision::Reject(GateRejection::PaymentRequired(PaymentRequired {
                x402_version: X402_VERSION,
                accepts: vec![requirements],
                error: None,
            }));
        };

        match self.process(payment_header, &requirements).await {
            Ok(admission) => GateDecision::Admit(admission),
            Err(rejection) => {
                match &rejection {
                    GateRejection::ProcessingFailed(e) => {
                        tracing::error!(path, error = %e, "Payment processing failed")
                    }
                    other => tracing::warn!(
                        path,
                        code = other.code(),
                        status = other.status().as_u16(),
                        "Payment rejected"
                    ),
                }
                GateDecision::Reject(rejection)
            }
        }
    }

    async fn process(
        &self,
        payment_header: &[u8],
        requirements: &PaymentRequirements,
    ) -> Result<Admission, GateRejection> {
        let payment_header = std::str::from_utf8(payment_header)
            .map_err(|e| GateRejection::ProcessingFailed(e.into()))?;
        let envelope = codec::decode(payment_header)
            .map_err(|e| GateRejection::ProcessingFailed(e.into()))?;

        if envelope.version() != Some(X402_VERSION) {
            return Err(GateRejection::UnsupportedVersion(envelope.x402_version));
        }
        if !envelope.scheme_str().is_some_and(|s| ExactScheme.eq(s)) {
            return Err(GateRejection::UnsupportedScheme(envelope.scheme));
        }

        tracing::info!(
            network = envelope.network_str().unwrap_or_default(),
            amount = %requirements.max_amount_required,
            "Verifying payment"
        );
        let started = Instant::now();
        let verification =
            AssertUnwindSafe(self.config.facilitator.verify(payment_header, requirements))
                .catch_unwind()
                .await
                .map_err(|_| GateRejection::ProcessingFailed(GateError::FacilitatorPanic("verify")))?;
        let verification_ms = elapsed_ms(started);
        if let VerifyResponse::Invalid { reason } = verification {
            return Err(GateRejection::VerificationFailed(reason));
        }

        tracing::info!(verification_ms, "Payment verified, settling");
        let started = Instant::now();
        let settlement =
            AssertUnwindSafe(self.config.facilitator.settle(payment_header, requirements))
                .catch_unwind()
                .await
                .map_err(|_| GateRejection::ProcessingFailed(GateError::FacilitatorPanic("settle")))?;
        let settlement_ms = elapsed_ms(started);
        let (tx_hash, network_id) = match settlement {
            SettleResponse::Success {
                tx_hash,
                network_id,
            } => (tx_hash, network_id),
            SettleResponse::Failed { error } => {
                return Err(GateRejection::SettlementFailed(error));
            }
        };

        tracing::info!(
            tx = short_hash(&tx_hash),
            network = %network_id,
            settlement_ms,
            "Payment settled"
        );

        let settlement = PaymentResponseHeader::new(tx_hash, network_id);
        let encoded =
            codec::encode(&settlement).map_err(|e| GateRejection::ProcessingFailed(e.into()))?;
        let payment_response = HeaderValue::from_str(&encoded)
            .map_err(|e| GateRejection::ProcessingFailed(e.into()))?;

        Ok(Admission {
            settlement,
            verification_ms,
            settlement_ms,
            payment_response,
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// First ten characters of a transaction hash, for logs.
fn short_hash(tx_hash: &str) -> &str {
    match tx_hash.char_indices().nth(10) {
        Some((end, _)) => &tx_hash[..end],
        None => tx_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v1_osmosis_exact::server::RouteConfig;
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl Facilitator for Unreachable {
        async fn verify(&self, _: &str, _: &PaymentRequirements) -> VerifyResponse {
            VerifyResponse::invalid("Failed to connect to facilitator")
        }

        async fn settle(&self, _: &str, _: &PaymentRequirements) -> SettleResponse {
            SettleResponse::failed("Failed to settle payment")
        }
    }

    fn gate(public_base_url: Option<&str>) -> PaymentGate {
        let routes = RouteTable::from_routes([("/premium", RouteConfig::new("1000"))]).unwrap();
        let mut config = GateConfig::new(routes, Unreachable).with_recipient("osmo1abc");
        if let Some(base) = public_base_url {
            config = config.with_public_base_url(base);
        }
        PaymentGate::new(config)
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("0x0123456789abcdef"), "0x01234567");
        assert_eq!(short_hash("0xab"), "0xab");
    }

    #[test]
    fn test_resource_url_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("api.example:4021"));
        let uri: Uri = "/premium?x=1".parse().unwrap();
        assert_eq!(
            gate(None).resource_url(&uri, &headers),
            "http://api.example:4021/premium?x=1"
        );
    }

    #[test]
    fn test_resource_url_prefers_absolute_uri_then_base_url() {
        let headers = HeaderMap::new();
        let absolute: Uri = "https://paid.example/premium".parse().unwrap();
        assert_eq!(
            gate(Some("https://public.example/")).resource_url(&absolute, &headers),
            "https://paid.example/premium"
        );
        let relative: Uri = "/premium".parse().unwrap();
        assert_eq!(
            gate(Some("https://public.example/")).resource_url(&relative, &headers),
            "https://public.example/premium"
        );
        assert_eq!(gate(None).resource_url(&relative, &headers), "http://localhost/premium");
    }

    #[test]
    fn test_rejection_statuses() {
        assert_eq!(GateRejection::MissingRecipient.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(GateRejection::UnsupportedVersion(Some(json!(2))).status(), StatusCode::BAD_REQUEST);
        assert_eq!(GateRejection::UnsupportedScheme(None).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GateRejection::VerificationFailed("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GateRejection::SettlementFailed("x".into()).status(),
            StatusCode::PAYMENT_REQUIRED
        );
    }

    #[tokio::test]
    async fn test_unguarded_path_passes_even_with_garbage_header() {
        let decision = gate(None)
            .evaluate("/free", "http://localhost/free", Some(b"!!!".as_slice()))
            .await;
        assert!(matches!(decision, GateDecision::Passthrough));
    }

    #[tokio::test]
    async fn test_blank_header_is_challenged() {
        for blank in [b"".as_slice(), b"  \t".as_slice()] {
            let decision = gate(None)
                .evaluate("/premium", "http://localhost/premium", Some(blank))
                .await;
            assert!(matches!(
                decision,
                GateDecision::Reject(GateRejection::PaymentRequired(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_non_utf8_header_is_processing_failure() {
        let decision = gate(None)
            .evaluate("/premium", "http://localhost/premium", Some([0xffu8, 0xfe].as_slice()))
            .await;
        assert!(matches!(
            decision,
            GateDecision::Reject(GateRejection::ProcessingFailed(GateError::HeaderEncoding(_)))
        ));
    }
}
