//! V1 Osmosis "exact" payment scheme implementation.
//!
//! This module implements the x402 version 1 "exact" scheme for Osmosis and
//! other Cosmos SDK chains signing with amino JSON.
//!
//! # Payment Model
//!
//! 1. The resource server answers an unpaid request with `402 Payment Required`
//!    and a list of [`PaymentRequirements`]
//! 2. The client builds a sign document for the payment, has its wallet sign
//!    it, and sends the signed document plus signature base64-encoded in the
//!    `X-PAYMENT` header
//! 3. The resource server asks the facilitator to verify, then settle, the
//!    payment before forwarding the request
//! 4. The settlement transaction hash is returned in `X-Payment-Response`
//!
//! # Usage
//!
//! ```ignore
//! use x402_osmosis::chain::FacilitatorConfig;
//! use x402_osmosis::v1_osmosis_exact::{
//!     FacilitatorClient, GateConfig, PaymentGate, RouteConfig, RouteTable,
//! };
//!
//! let routes = RouteTable::from_routes([("/premium", RouteConfig::new("1000"))])?;
//! let facilitator = FacilitatorClient::new(FacilitatorConfig::new("http://localhost:3000"));
//! let gate = PaymentGate::new(GateConfig::new(routes, facilitator).with_recipient("osmo1..."));
//! let app = Router::new().route("/premium", get(premium)).layer(gate);
//! ```

pub mod codec;
pub use codec::*;

pub mod types;
pub use types::*;

#[cfg(feature = "facilitator-client")]
pub mod facilitator;
#[cfg(feature = "facilitator-client")]
pub use facilitator::*;

#[cfg(feature = "server")]
pub mod server;
#[cfg(feature = "server")]
pub use server::*;

#[cfg(feature = "server")]
pub mod gate;
#[cfg(feature = "server")]
pub use gate::*;

#[cfg(feature = "server")]
pub mod layer;
#[cfg(feature = "server")]
pub use layer::*;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "client")]
pub use client::*;

/// The only x402 protocol version this scheme speaks.
///
/// Compared by exact equality; there is no version negotiation.
pub const X402_VERSION: u64 = 1;

/// Request header carrying the payment envelope.
pub const X_PAYMENT: &str = "x-payment";

/// Response header carrying the encoded settlement summary.
pub const X_PAYMENT_RESPONSE: &str = "x-payment-response";

/// Response header with the verification round trip in milliseconds.
pub const X_VERIFICATION_TIME: &str = "x-verification-time";

/// Response header with the settlement round trip in milliseconds.
pub const X_SETTLEMENT_TIME: &str = "x-settlement-time";

/// The V1 Osmosis "exact" payment scheme.
///
/// Serves as the scheme identifier; see [`V1OsmosisExact::requirements`]
/// for building the requirements advertised to clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct V1OsmosisExact;

impl V1OsmosisExact {
    pub fn namespace(&self) -> &str {
        "cosmos"
    }

    pub fn scheme(&self) -> &str {
        ExactScheme.as_ref()
    }

    pub fn x402_version(&self) -> u64 {
        X402_VERSION
    }
}
