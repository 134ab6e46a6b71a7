//! Base64 JSON codec for x402 headers.
//!
//! The `X-PAYMENT` request header and the `X-Payment-Response` response
//! header both carry a JSON document encoded with standard base64.
//! Decoding is total: every malformed input maps to an
//! [`EnvelopeDecodeError`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::v1_osmosis_exact::types::{PaymentPayload, PaymentResponseHeader};

/// Failure to decode a base64 JSON header.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeDecodeError {
    /// The header is not valid base64.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded bytes are not a JSON document of the expected shape.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to encode a document into a header value.
#[derive(Debug, thiserror::Error)]
#[error("failed to serialize header document: {0}")]
pub struct EnvelopeEncodeError(#[from] serde_json::Error);

/// Decodes an `X-PAYMENT` header value into a [`PaymentPayload`].
///
/// Only the encoding and the general JSON shape are checked; use
/// [`PaymentPayload::is_structurally_valid`] for field presence.
pub fn decode(header: &str) -> Result<PaymentPayload, EnvelopeDecodeError> {
    decode_as(header)
}

/// Decodes a base64 JSON header into any deserializable document.
pub fn decode_as<T: DeserializeOwned>(header: &str) -> Result<T, EnvelopeDecodeError> {
    let bytes = STANDARD.decode(header.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Encodes a document as base64 JSON.
///
/// Output is deterministic for a given document.
pub fn encode<T: Serialize>(document: &T) -> Result<String, EnvelopeEncodeError> {
    let json = serde_json::to_vec(document)?;
    Ok(STANDARD.encode(json))
}

/// Decodes an `X-Payment-Response` header value.
pub fn decode_payment_response(header: &str) -> Result<PaymentResponseHeader, EnvelopeDecodeError> {
    decode_as(header)
}
