//! Example client that pays for HTTP requests on Osmosis.
//!
//! This example demonstrates how a client would:
//! 1. Make a request to a protected endpoint
//! 2. Receive a 402 Payment Required response
//! 3. Have its wallet sign a payment for the advertised requirements
//! 4. Retry the request with the signed envelope in `X-PAYMENT`
//!
//! The wallet and sign document builder here are mocks: a real client would
//! build a `cosmos-sdk/MsgSend` amino document and sign it with a browser
//! or hardware wallet.
//!
//! # Running
//!
//! ```bash
//! # Start the resource server first:
//! RECIPIENT_ADDRESS=osmo1... cargo run -p x402-osmosis-server
//!
//! # Then run this client:
//! ENDPOINT=http://localhost:4021/premium cargo run -p x402-osmosis-client-demo
//! ```

use async_trait::async_trait;
use serde_json::json;
use x402_osmosis::OsmosisExactClient;
use x402_osmosis::v1_osmosis_exact::{
    ClientError, PaymentIntent, PaymentRequired, SignDocBuilder, SignedPayload, WalletError,
    WalletSigner, X_PAYMENT, X_PAYMENT_RESPONSE, decode_payment_response,
};

/// Builds a minimal amino `MsgSend` document for the intent.
struct MsgSendBuilder;

#[async_trait]
impl SignDocBuilder for MsgSendBuilder {
    async fn build_sign_doc(
        &self,
        intent: &PaymentIntent,
    ) -> Result<serde_json::Value, ClientError> {
        // Account number and sequence would come from the chain.
        Ok(json!({
            "account_number": "0",
            "sequence": "0",
            "fee": {"amount": [], "gas": "200000"},
            "memo": intent.memo,
            "msgs": [{
                "type": "cosmos-sdk/MsgSend",
                "value": {
                    "from_address": intent.from,
                    "to_address": intent.to,
                    "amount": intent.coin,
                },
            }],
        }))
    }
}

/// A wallet that signs everything with a fixed placeholder signature.
struct MockWallet;

#[async_trait]
impl WalletSigner for MockWallet {
    async fn sign_amino(
        &self,
        chain_id: &str,
        signer: &str,
        mut sign_doc: serde_json::Value,
    ) -> Result<SignedPayload, WalletError> {
        tracing::info!(chain_id, signer, "Mock wallet signing payment");
        sign_doc["chain_id"] = json!(chain_id);
        Ok(SignedPayload::new(
            sign_doc,
            json!({
                "pub_key": {"type": "tendermint/PubKeySecp256k1", "value": "bW9jay1wdWJrZXk="},
                "signature": "bW9jay1zaWduYXR1cmU=",
            }),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let endpoint =
        std::env::var("ENDPOINT").unwrap_or_else(|_| "http://localhost:4021/premium".to_string());
    let payer = std::env::var("PAYER_ADDRESS")
        .unwrap_or_else(|_| "osmo1qqqsyqcyq5rqwzqfpg9scrgwpugpzysn7hxlh2".to_string());

    let client = OsmosisExactClient::new(MsgSendBuilder, MockWallet);

    // Step 1: Make initial request
    tracing::info!("Requesting {endpoint}");
    let http = reqwest::Client::new();
    let response = http.get(&endpoint).send().await?;
    tracing::info!("Status: {}", response.status());

    if response.status() != reqwest::StatusCode::PAYMENT_REQUIRED {
        let body = response.text().await?;
        tracing::info!("Response: {body}");
        return Ok(());
    }

    // Step 2: Parse payment requirements
    let payment_required: PaymentRequired = response.json().await?;
    tracing::info!(
        version = payment_required.x402_version,
        accepts_count = payment_required.accepts.len(),
        "Received 402 Payment Required"
    );

    let accepted = client.accept(&payment_required);
    let Some(requirements) = accepted.first() else {
        tracing::warn!("No payable requirements offered");
        return Ok(());
    };
    tracing::info!(
        network = %requirements.network,
        amount = %requirements.max_amount_required,
        pay_to = %requirements.pay_to,
        "Paying"
    );

    // Step 3: Sign the payment
    let intent = PaymentIntent::from_requirements(&payer, requirements, "uosmo", "x402")?;
    let signed = client.sign_for_network(&intent).await?;

    // Step 4: Retry with the payment header
    let response = http
        .get(&endpoint)
        .header(X_PAYMENT, &signed.payment_header)
        .send()
        .await?;
    tracing::info!("Status: {}", response.status());

    if let Some(header) = response.headers().get(X_PAYMENT_RESPONSE) {
        let settlement = decode_payment_response(header.to_str()?)?;
        tracing::info!(
            tx_hash = %settlement.tx_hash,
            network = %settlement.network,
            "Payment settled"
        );
    }
    let body = response.text().await?;
    tracing::info!("Response: {body}");

    Ok(())
}
