//! Client-side payment signing for the V1 Osmosis "exact" scheme.
//!
//! This module provides [`OsmosisExactClient`] for turning a payment intent
//! into a ready-to-send `X-PAYMENT` header.
//!
//! # Payment Flow
//!
//! 1. Client receives a 402 response with Osmosis payment requirements
//! 2. [`OsmosisExactClient::accept`] keeps the requirements it can pay
//! 3. [`PaymentIntent::from_requirements`] derives what to pay
//! 4. [`OsmosisExactClient::sign_payment`]:
//!    a. Asks the [`SignDocBuilder`] for the document to sign
//!    b. Asks the [`WalletSigner`] for an amino signature over it
//!    c. Wraps the result in a version 1 "exact" envelope
//!    d. Encodes the envelope as base64 JSON
//! 5. The header is sent as `X-PAYMENT` on the retried request
//!
//! Building the chain-specific sign document and holding keys are both left
//! to the caller's implementations of the two traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::OsmosisNetwork;
use crate::chain::Coin;
use crate::v1_osmosis_exact::codec::{self, EnvelopeEncodeError};
use crate::v1_osmosis_exact::types::{
    ExactScheme, PaymentPayload, PaymentRequired, PaymentRequirements, SignedPayload,
};
use crate::v1_osmosis_exact::{V1OsmosisExact, X402_VERSION};

/// Failure reported by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("wallet not available")]
    Unavailable,
    #[error("signature request declined: {0}")]
    Declined(String),
    #[error("wallet error: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("failed to build sign document: {0}")]
    SignDoc(String),
    #[error("invalid payment amount `{0}`")]
    InvalidAmount(String),
    #[error("unknown network `{0}`")]
    UnknownNetwork(String),
    #[error(transparent)]
    Encode(#[from] EnvelopeEncodeError),
}

/// What the client is about to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub from: String,
    pub to: String,
    pub coin: Vec<Coin>,
    pub memo: String,
    pub network: String,
}

impl PaymentIntent {
    /// Derives an intent that pays exactly what `requirements` ask for.
    pub fn from_requirements(
        from: impl Into<String>,
        requirements: &PaymentRequirements,
        denom: &str,
        memo: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let amount: u128 = requirements
            .max_amount_required
            .parse()
            .map_err(|_| ClientError::InvalidAmount(requirements.max_amount_required.clone()))?;
        Ok(Self {
            from: from.into(),
            to: requirements.pay_to.clone(),
            coin: vec![Coin::new(denom, amount)],
            memo: memo.into(),
            network: requirements.network.clone(),
        })
    }
}

/// Builds the document a wallet signs for a payment.
#[async_trait]
pub trait SignDocBuilder: Send + Sync {
    /// Returns the amino sign document for `intent`.
    async fn build_sign_doc(&self, intent: &PaymentIntent)
    -> Result<serde_json::Value, ClientError>;
}

/// A wallet able to produce amino JSON signatures.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Signs `sign_doc` with the key of `signer` on `chain_id`.
    ///
    /// The returned payload carries the document as actually signed, which
    /// may differ from the one submitted (wallets can adjust fees or memo).
    async fn sign_amino(
        &self,
        chain_id: &str,
        signer: &str,
        sign_doc: serde_json::Value,
    ) -> Result<SignedPayload, WalletError>;
}

/// A signed envelope and its header encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedPayment {
    pub payment_payload: PaymentPayload,
    /// Value for the `X-PAYMENT` request header.
    pub payment_header: String,
}

/// Client for signing V1 Osmosis exact scheme payments.
///
/// # Example
///
/// ```ignore
/// use x402_osmosis::v1_osmosis_exact::{OsmosisExactClient, PaymentIntent};
///
/// let client = OsmosisExactClient::new(builder, wallet);
/// let requirements = &client.accept(&payment_required)[0];
/// let intent = PaymentIntent::from_requirements("osmo1me...", requirements, "uosmo", "x402")?;
/// let signed = client.sign_for_network(&intent).await?;
/// ```
#[derive(Debug)]
pub struct OsmosisExactClient<B, W> {
    builder: B,
    wallet: W,
}

impl<B, W> OsmosisExactClient<B, W> {
    pub fn new(builder: B, wallet: W) -> Self {
        Self { builder, wallet }
    }

    pub fn scheme(&self) -> &str {
        V1OsmosisExact.scheme()
    }

    /// Requirements from a challenge this client can pay.
    ///
    /// Challenges of another protocol version yield nothing.
    pub fn accept(&self, payment_required: &PaymentRequired) -> Vec<PaymentRequirements> {
        if payment_required.x402_version != X402_VERSION {
            return vec![];
        }
        payment_required
            .accepts
            .iter()
            .filter(|requirements| ExactScheme.eq(requirements.scheme.as_str()))
            .cloned()
            .collect()
    }
}

impl<B, W> OsmosisExactClient<B, W>
where
    B: SignDocBuilder,
    W: WalletSigner,
{
    /// Builds, signs and encodes a payment for `intent` on `chain_id`.
    pub async fn sign_payment(
        &self,
        chain_id: &str,
        intent: &PaymentIntent,
    ) -> Result<SignedPayment, ClientError> {
        let sign_doc = self.builder.build_sign_doc(intent).await?;
        let signed = self
            .wallet
            .sign_amino(chain_id, &intent.from, sign_doc)
            .await?;

        let payment_payload = PaymentPayload::exact(intent.network.clone(), signed);
        let payment_header = codec::encode(&payment_payload)?;
        tracing::debug!(network = %intent.network, chain_id, "Signed payment");

        Ok(SignedPayment {
            payment_payload,
            payment_header,
        })
    }

    /// Like [`sign_payment`](Self::sign_payment), with the chain ID of a
    /// known Osmosis network.
    pub async fn sign_for_network(
        &self,
        intent: &PaymentIntent,
    ) -> Result<SignedPayment, ClientError> {
        let network = OsmosisNetwork::from_id(&intent.network)
            .ok_or_else(|| ClientError::UnknownNetwork(intent.network.clone()))?;
        self.sign_payment(network.chain_id, intent).await
    }
}
