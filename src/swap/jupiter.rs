//! Jupiter v6 aggregator client
//!
//! This client only fetches quotes and unsigned transactions, it NEVER signs.

use crate::config::JupiterConfig;
use crate::swap::{QuoteRequest, SwapAggregator, SwapQuote};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: String,
    #[serde(default)]
    last_valid_block_height: Option<u64>,
}

pub struct JupiterClient {
    client: Client,
    quote_url: String,
    swap_url: String,
}

impl JupiterClient {
    pub fn new(config: &JupiterConfig) -> Self {
        Self {
            client: Client::new(),
            quote_url: config.quote_url.clone(),
            swap_url: config.swap_url.clone(),
        }
    }

    fn quote_request(&self, request: &QuoteRequest) -> RequestBuilder {
        self.client.get(&self.quote_url).query(&[
            ("inputMint", request.input_mint.to_string()),
            ("outputMint", request.output_mint.to_string()),
            ("amount", request.amount.base_units.to_string()),
            ("slippageBps", request.slippage_bps.to_string()),
        ])
    }

    fn swap_request(&self, quote: &SwapQuote, user: &Pubkey) -> RequestBuilder {
        self.client.post(&self.swap_url).json(&json!({
            "quoteResponse": quote.raw,
            "userPublicKey": user.to_string(),
            "wrapAndUnwrapSol": true,
        }))
    }
}

/// Keep upstream error bodies short in our error messages
fn snippet(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl SwapAggregator for JupiterClient {
    async fn quote(&self, request: &QuoteRequest) -> Result<SwapQuote> {
        let response = self
            .quote_request(request)
            .send()
            .await
            .map_err(|e| Error::QuoteUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::QuoteUnavailable(format!(
                "HTTP {}: {}",
                status,
                snippet(&body)
            )));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| Error::QuoteUnavailable(format!("Failed to parse quote: {}", e)))?;
        SwapQuote::from_value(raw)
    }

    async fn swap_transaction(&self, quote: &SwapQuote, user: &Pubkey) -> Result<Vec<u8>> {
        let response = self
            .swap_request(quote, user)
            .send()
            .await
            .map_err(|e| Error::SwapBuildFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SwapBuildFailed(format!(
                "HTTP {}: {}",
                status,
                snippet(&body)
            )));
        }

        let swap: SwapResponse = response
            .json()
            .await
            .map_err(|e| Error::SwapBuildFailed(format!("Failed to parse swap response: {}", e)))?;

        tracing::debug!(
            last_valid_block_height = ?swap.last_valid_block_height,
            "Received swap transaction"
        );

        BASE64
            .decode(swap.swap_transaction.as_bytes())
            .map_err(|e| Error::SwapBuildFailed(format!("swapTransaction is not base64: {}", e)))
    }

    fn name(&self) -> &'static str {
        "jupiter"
    }
}
