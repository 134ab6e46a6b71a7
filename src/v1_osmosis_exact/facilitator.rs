//! Facilitator access for the V1 Osmosis exact scheme.
//!
//! The resource server never verifies signatures or broadcasts transactions
//! itself. It hands the raw `X-PAYMENT` header and the requirements to a
//! facilitator:
//!
//! 1. **Verify**: is this payment acceptable for these requirements?
//! 2. **Settle**: finalize the verified payment and report the transaction
//!
//! [`FacilitatorClient`] talks to a facilitator over HTTP. It never lets a
//! transport fault escape; failures are downgraded to negative results with
//! fixed messages and logged with their distinct kind.

use async_trait::async_trait;

use crate::chain::{
    EnvSource, FacilitatorConfig, FacilitatorEndpoint, FacilitatorPaths, resolve_facilitator_url,
};
use crate::v1_osmosis_exact::codec;
use crate::v1_osmosis_exact::types::{
    FacilitatorRequest, PaymentRequirements, SettleResponse, VerifyResponse,
};

/// Reason reported when the facilitator could not be reached during verification.
pub const VERIFY_CONNECT_FAILURE: &str = "Failed to connect to facilitator";

/// Reason reported when the facilitator could not be reached during settlement.
pub const SETTLE_FAILURE: &str = "Failed to settle payment";

/// Reason reported when the envelope fails the local shape check.
pub const INVALID_PAYLOAD_STRUCTURE: &str = "Invalid payment payload structure";

/// A service that verifies and settles payments.
///
/// Both operations are infallible from the caller's point of view: every
/// failure is expressed as a negative result.
/// A panic inside either call is caught by the gate and answered as a
/// processing failure.
#[async_trait]
pub trait Facilitator: Send + Sync {
    /// Verifies `payment_header` against `requirements`.
    async fn verify(&self, payment_header: &str, requirements: &PaymentRequirements)
    -> VerifyResponse;

    /// Settles a previously verified payment.
    async fn settle(&self, payment_header: &str, requirements: &PaymentRequirements)
    -> SettleResponse;
}

/// Why a facilitator call produced no usable answer.
///
/// Only used for logging; callers see the downgraded negative result.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    /// The request could not be sent or the response body not read.
    #[error("HTTP request error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-success status with a body that is not a result.
    #[error("facilitator answered with HTTP {0}")]
    Status(u16),
    /// The body is not JSON, or its fields contradict the success flag.
    #[error("malformed facilitator response: {0}")]
    Body(#[source] serde_json::Error),
}

impl FacilitatorClientError {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FacilitatorClientError::Transport(_) => "transport",
            FacilitatorClientError::Status(_) => "status",
            FacilitatorClientError::Body(_) => "body",
        }
    }
}

/// Stateless HTTP client for a remote facilitator.
///
/// Each call is a single POST; nothing is retried or cached.
///
/// # Example
///
/// ```ignore
/// use x402_osmosis::chain::FacilitatorConfig;
/// use x402_osmosis::v1_osmosis_exact::FacilitatorClient;
///
/// let client = FacilitatorClient::new(FacilitatorConfig::new("https://facilitator.example"));
/// let verdict = client.verify(&header, &requirements).await;
/// ```
#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    verify_url: String,
    settle_url: String,
    http: reqwest::Client,
}

impl FacilitatorClient {
    /// Creates a client for the facilitator described by `config`.
    pub fn new(config: FacilitatorConfig) -> Self {
        Self {
            verify_url: config.endpoint_url(FacilitatorEndpoint::Verify),
            settle_url: config.endpoint_url(FacilitatorEndpoint::Settle),
            http: reqwest::Client::new(),
        }
    }

    /// Creates a client, resolving the base URL for each endpoint from
    /// `explicit` and the environment.
    ///
    /// Verification and settlement may resolve to different hosts, since
    /// only settlement falls back to the site URL.
    pub fn from_env(
        explicit: Option<&str>,
        paths: FacilitatorPaths,
        env: &impl EnvSource,
    ) -> Self {
        let verify = FacilitatorConfig::new(resolve_facilitator_url(
            explicit,
            env,
            FacilitatorEndpoint::Verify,
        ))
        .with_paths(paths);
        let settle = FacilitatorConfig::new(resolve_facilitator_url(
            explicit,
            env,
            FacilitatorEndpoint::Settle,
        ))
        .with_paths(paths);
        Self {
            verify_url: verify.endpoint_url(FacilitatorEndpoint::Verify),
            settle_url: settle.endpoint_url(FacilitatorEndpoint::Settle),
            http: reqwest::Client::new(),
        }
    }

    /// Replaces the underlying HTTP client.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn verify_url(&self) -> &str {
        &self.verify_url
    }

    pub fn settle_url(&self) -> &str {
        &self.settle_url
    }

    /// Calls `/verify`, surfacing every failure.
    pub async fn try_verify(
        &self,
        payment_header: &str,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        self.post(&self.verify_url, payment_header, requirements).await
    }

    /// Calls `/settle`, surfacing every failure.
    pub async fn try_settle(
        &self,
        payment_header: &str,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        self.post(&self.settle_url, payment_header, requirements).await
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        payment_header: &str,
        requirements: &PaymentRequirements,
    ) -> Result<T, FacilitatorClientError> {
        let body = FacilitatorRequest::new(payment_header, requirements.clone());
        let response = self.http.post(url).json(&body).send().await?;
        // Facilitators may report a rejection in the body of a non-2xx
        // response, so the body decides.
        let status = response.status();
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            if status.is_success() {
                FacilitatorClientError::Body(e)
            } else {
                FacilitatorClientError::Status(status.as_u16())
            }
        })
    }
}

#[async_trait]
impl Facilitator for FacilitatorClient {
    async fn verify(
        &self,
        payment_header: &str,
        requirements: &PaymentRequirements,
    ) -> VerifyResponse {
        let structurally_valid = codec::decode(payment_header)
            .map(|envelope| envelope.is_structurally_valid())
            .unwrap_or(false);
        if !structurally_valid {
            tracing::warn!("Payment envelope failed the structural check");
            return VerifyResponse::invalid(INVALID_PAYLOAD_STRUCTURE);
        }

        match self.try_verify(payment_header, requirements).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    kind = e.kind(),
                    url = %self.verify_url,
                    "Verification failed"
                );
                VerifyResponse::invalid(VERIFY_CONNECT_FAILURE)
            }
        }
    }

    async fn settle(
        &self,
        payment_header: &str,
        requirements: &PaymentRequirements,
    ) -> SettleResponse {
        match self.try_settle(payment_header, requirements).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    kind = e.kind(),
                    url = %self.settle_url,
                    "Settlement failed"
                );
                SettleResponse::failed(SETTLE_FAILURE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_client_urls_from_config() {
        let client = FacilitatorClient::new(
            FacilitatorConfig::new("http://f.example").with_paths(FacilitatorPaths::Api),
        );
        assert_eq!(client.verify_url(), "http://f.example/api/facilitator/verify");
        assert_eq!(client.settle_url(), "http://f.example/api/facilitator/settle");
    }

    #[test]
    fn test_client_urls_from_env_split_on_site_url() {
        let env: HashMap<String, String> =
            [("SITE_URL".to_string(), "http://site.example".to_string())].into();
        let client = FacilitatorClient::from_env(None, FacilitatorPaths::Root, &env);
        assert_eq!(client.verify_url(), "http://localhost:3000/verify");
        assert_eq!(client.settle_url(), "http://site.example/settle");
    }

    #[tokio::test]
    async fn test_verify_rejects_malformed_envelope_without_network() {
        // Port 9 (discard) is never contacted: the shape check fails first.
        let client = FacilitatorClient::new(FacilitatorConfig::new("http://127.0.0.1:9"));
        let requirements = PaymentRequirements {
            scheme: "exact".into(),
            network: "osmo-test".into(),
            max_amount_required: "1".into(),
            resource: "http://localhost/".into(),
            description: String::new(),
            mime_type: "application/json".into(),
            output_schema: None,
            pay_to: "osmo1abc".into(),
            max_timeout_seconds: 300,
            extra: None,
        };
        let verdict = client.verify("bm90IGpzb24=", &requirements).await;
        assert_eq!(verdict, VerifyResponse::invalid(INVALID_PAYLOAD_STRUCTURE));
    }
}
