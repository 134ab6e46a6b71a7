//! Osmosis support for the x402 payment protocol.
//!
//! This crate gates HTTP resources behind per-request payments on Osmosis
//! (and other Cosmos SDK chains signing with amino JSON), using the x402
//! version 1 "exact" scheme.
//!
//! # Architecture
//!
//! 1. **Server** answers an unpaid request to a guarded route with
//!    `402 Payment Required` and the payment requirements
//! 2. **Client** has its wallet sign a payment and retries with the signed
//!    envelope in the `X-PAYMENT` header
//! 3. **Facilitator** (a separate HTTP service) verifies and then settles
//!    the payment on behalf of the server
//! 4. **Server** forwards the request and reports the settlement
//!    transaction in `X-Payment-Response`
//!
//! # Feature Flags
//!
//! - `facilitator-client` - HTTP client for a remote facilitator
//! - `server` - Payment gate and its tower layer (implies `facilitator-client`)
//! - `client` - Client-side payment signing against an external wallet
//!
//! # Usage
//!
//! ## Server: Guarding a Route
//!
//! ```ignore
//! use x402_osmosis::chain::FacilitatorConfig;
//! use x402_osmosis::v1_osmosis_exact::{FacilitatorClient, GateConfig, RouteConfig, RouteTable};
//! use x402_osmosis::PaymentGate;
//!
//! let routes = RouteTable::from_routes([("/premium", RouteConfig::new("1000"))])?;
//! let facilitator = FacilitatorClient::new(FacilitatorConfig::new("http://localhost:3000"));
//! let gate = PaymentGate::new(GateConfig::new(routes, facilitator).with_recipient("osmo1..."));
//! let app = Router::new().route("/premium", get(premium)).layer(gate);
//! ```
//!
//! ## Client: Signing a Payment
//!
//! ```ignore
//! use x402_osmosis::OsmosisExactClient;
//!
//! let client = OsmosisExactClient::new(sign_doc_builder, wallet);
//! let signed = client.sign_for_network(&intent).await?;
//! ```

pub mod chain;
pub mod v1_osmosis_exact;

mod networks;
pub use networks::*;

pub use v1_osmosis_exact::V1OsmosisExact;

#[cfg(feature = "facilitator-client")]
pub use v1_osmosis_exact::facilitator::{Facilitator, FacilitatorClient};

#[cfg(feature = "server")]
pub use v1_osmosis_exact::gate::PaymentGate;

#[cfg(feature = "client")]
pub use v1_osmosis_exact::client::OsmosisExactClient;
