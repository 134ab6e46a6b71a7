//! Wire types for the V1 Osmosis "exact" payment scheme.
//!
//! Field names follow the x402 v1 JSON wire format (camelCase).

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// String literal for the "exact" scheme name.
#[derive(Debug, Clone, Copy)]
pub struct ExactScheme;

impl AsRef<str> for ExactScheme {
    fn as_ref(&self) -> &str {
        "exact"
    }
}

impl std::fmt::Display for ExactScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exact")
    }
}

impl PartialEq<str> for ExactScheme {
    fn eq(&self, other: &str) -> bool {
        self.as_ref() == other
    }
}

/// Terms a payment must satisfy to unlock a resource.
///
/// Built fresh for every request; never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme, e.g. `exact`.
    pub scheme: String,
    /// Network the payment must be made on, e.g. `osmo-test`.
    pub network: String,
    /// Price in atomic units, as a decimal string.
    pub max_amount_required: String,
    /// Absolute URL of the guarded resource.
    pub resource: String,
    pub description: String,
    /// MIME type of the resource response.
    pub mime_type: String,
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
    /// Address receiving the payment.
    pub pay_to: String,
    /// Advisory deadline handed to client and facilitator.
    pub max_timeout_seconds: u64,
    /// Scheme-specific data, opaque to the gate.
    #[serde(default)]
    pub extra: Option<serde_json::Value>,
}

/// Body of a `402 Payment Required` challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    pub x402_version: u64,
    pub accepts: Vec<PaymentRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The decoded `X-PAYMENT` envelope.
///
/// Decoding only checks that the header is base64 JSON of the right general
/// shape. The scalar fields are kept as raw JSON so that a version or scheme
/// of the wrong type is answered as unsupported rather than as a decode
/// failure, and a `payload` that is not an object decodes as empty. Presence
/// of the required fields is checked separately by
/// [`PaymentPayload::is_structurally_valid`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_version: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<serde_json::Value>,
    #[serde(
        default,
        deserialize_with = "lenient_payload",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<SignedPayload>,
}

impl PaymentPayload {
    /// Creates a version 1 "exact" envelope for `network`.
    pub fn exact(network: impl Into<String>, payload: SignedPayload) -> Self {
        Self {
            x402_version: Some(super::X402_VERSION.into()),
            scheme: Some(ExactScheme.to_string().into()),
            network: Some(serde_json::Value::String(network.into())),
            payload: Some(payload),
        }
    }

    /// The protocol version, if it is a non-negative whole number.
    ///
    /// `1.0` reads as `1`; strings, fractions and negatives read as `None`.
    pub fn version(&self) -> Option<u64> {
        let serde_json::Value::Number(number) = self.x402_version.as_ref()? else {
            return None;
        };
        number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        })
    }

    /// The scheme, if it is a JSON string.
    pub fn scheme_str(&self) -> Option<&str> {
        self.scheme.as_ref().and_then(serde_json::Value::as_str)
    }

    /// The network, if it is a JSON string.
    pub fn network_str(&self) -> Option<&str> {
        self.network.as_ref().and_then(serde_json::Value::as_str)
    }

    /// Shape check only; the signature itself is never inspected here.
    ///
    /// True iff `x402Version`, `scheme`, `network`, `payload.signed` and
    /// `payload.signature` are all present and truthy.
    pub fn is_structurally_valid(&self) -> bool {
        let truthy = |v: &Option<serde_json::Value>| v.as_ref().is_some_and(is_truthy);
        let signed_ok = self
            .payload
            .as_ref()
            .is_some_and(|p| truthy(&p.signed) && truthy(&p.signature));

        truthy(&self.x402_version) && truthy(&self.scheme) && truthy(&self.network) && signed_ok
    }
}

fn lenient_payload<'de, D>(deserializer: D) -> Result<Option<SignedPayload>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Object(mut fields)) => Some(SignedPayload {
            signed: fields.remove("signed").filter(|v| !v.is_null()),
            signature: fields.remove("signature").filter(|v| !v.is_null()),
        }),
        Some(_) => Some(SignedPayload::default()),
    })
}

/// Truthiness of a JSON value as loosely-typed clients understand it.
fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

/// The signed part of an envelope.
///
/// `signed` is the exact document the wallet signed and `signature` the
/// wallet's signature over it. Both are opaque to the gate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<serde_json::Value>,
}

impl SignedPayload {
    pub fn new(signed: serde_json::Value, signature: serde_json::Value) -> Self {
        Self {
            signed: Some(signed),
            signature: Some(signature),
        }
    }
}

/// Body of a facilitator `/verify` or `/settle` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorRequest {
    pub x402_version: u64,
    /// The raw `X-PAYMENT` header value, passed through untouched.
    pub payment_header: String,
    pub payment_requirements: PaymentRequirements,
}

/// Type alias for facilitator verify requests.
pub type VerifyRequest = FacilitatorRequest;

/// Type alias for facilitator settle requests (same structure as verify).
pub type SettleRequest = FacilitatorRequest;

impl FacilitatorRequest {
    pub fn new(payment_header: impl Into<String>, requirements: PaymentRequirements) -> Self {
        Self {
            x402_version: super::X402_VERSION,
            payment_header: payment_header.into(),
            payment_requirements: requirements,
        }
    }
}

/// Facilitator verdict on a payment.
///
/// On the wire this is `{isValid, invalidReason}`; a reason must be present
/// exactly when the payment is invalid, and any other shape is rejected
/// during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VerifyResponseWire", into = "VerifyResponseWire")]
pub enum VerifyResponse {
    Valid,
    Invalid { reason: String },
}

impl VerifyResponse {
    pub fn invalid(reason: impl Into<String>) -> Self {
        VerifyResponse::Invalid {
            reason: reason.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResponse::Valid)
    }

    pub fn invalid_reason(&self) -> Option<&str> {
        match self {
            VerifyResponse::Valid => None,
            VerifyResponse::Invalid { reason } => Some(reason),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponseWire {
    is_valid: bool,
    #[serde(default)]
    invalid_reason: Option<String>,
}

impl TryFrom<VerifyResponseWire> for VerifyResponse {
    type Error = ResponseShapeError;

    fn try_from(wire: VerifyResponseWire) -> Result<Self, Self::Error> {
        match (wire.is_valid, wire.invalid_reason) {
            (true, None) => Ok(VerifyResponse::Valid),
            (true, Some(_)) => Err(ResponseShapeError::UnexpectedField("invalidReason")),
            (false, Some(reason)) => Ok(VerifyResponse::Invalid { reason }),
            (false, None) => Err(ResponseShapeError::MissingField("invalidReason")),
        }
    }
}

impl From<VerifyResponse> for VerifyResponseWire {
    fn from(value: VerifyResponse) -> Self {
        match value {
            VerifyResponse::Valid => VerifyResponseWire {
                is_valid: true,
                invalid_reason: None,
            },
            VerifyResponse::Invalid { reason } => VerifyResponseWire {
                is_valid: false,
                invalid_reason: Some(reason),
            },
        }
    }
}

/// Facilitator outcome of a settlement.
///
/// On the wire this is `{success, error, txHash, networkId}`. A successful
/// settlement must name the transaction and network and carry no error; a
/// failed one must carry an error and no transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SettleResponseWire", into = "SettleResponseWire")]
pub enum SettleResponse {
    Success { tx_hash: String, network_id: String },
    Failed { error: String },
}

impl SettleResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        SettleResponse::Failed {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SettleResponse::Success { .. })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleResponseWire {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    tx_hash: Option<String>,
    #[serde(default)]
    network_id: Option<String>,
}

impl TryFrom<SettleResponseWire> for SettleResponse {
    type Error = ResponseShapeError;

    fn try_from(wire: SettleResponseWire) -> Result<Self, Self::Error> {
        if wire.success {
            if wire.error.is_some() {
                return Err(ResponseShapeError::UnexpectedField("error"));
            }
            let tx_hash = wire.tx_hash.ok_or(ResponseShapeError::MissingField("txHash"))?;
            let network_id = wire
                .network_id
                .ok_or(ResponseShapeError::MissingField("networkId"))?;
            Ok(SettleResponse::Success {
                tx_hash,
                network_id,
            })
        } else {
            if wire.tx_hash.is_some() {
                return Err(ResponseShapeError::UnexpectedField("txHash"));
            }
            if wire.network_id.is_some() {
                return Err(ResponseShapeError::UnexpectedField("networkId"));
            }
            let error = wire.error.ok_or(ResponseShapeError::MissingField("error"))?;
            Ok(SettleResponse::Failed { error })
        }
    }
}

impl From<SettleResponse> for SettleResponseWire {
    fn from(value: SettleResponse) -> Self {
        match value {
            SettleResponse::Success {
                tx_hash,
                network_id,
            } => SettleResponseWire {
                success: true,
                error: None,
                tx_hash: Some(tx_hash),
                network_id: Some(network_id),
            },
            SettleResponse::Failed { error } => SettleResponseWire {
                success: false,
                error: Some(error),
                tx_hash: None,
                network_id: None,
            },
        }
    }
}

/// A facilitator response whose fields contradict its own success flag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseShapeError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` not allowed for this outcome")]
    UnexpectedField(&'static str),
}

/// Contents of the `X-Payment-Response` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponseHeader {
    pub tx_hash: String,
    pub network: String,
    /// Milliseconds since the Unix epoch when the header was produced.
    pub timestamp: u64,
}

impl PaymentResponseHeader {
    /// Creates a header stamped with the current time.
    pub fn new(tx_hash: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            network: network.into(),
            timestamp: epoch_millis(),
        }
    }
}

pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
