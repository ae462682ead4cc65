//! USD price lookups
//!
//! Both sources are best effort. Callers decide how to degrade; the workflow
//! treats any failure as a price of zero.

use crate::config::PriceConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;

#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// USD price of one SOL
    async fn native_asset_price_usd(&self) -> Result<f64>;

    /// USD price of one whole token, `None` when the source has no price
    async fn token_price_usd(&self, mint: &Pubkey) -> Result<Option<f64>>;
}

#[derive(Debug, Deserialize)]
struct CoinGeckoSimplePrice {
    solana: CoinGeckoUsd,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoUsd {
    usd: f64,
}

#[derive(Debug, Deserialize)]
struct BirdeyePriceResponse {
    #[serde(default)]
    data: Option<BirdeyePrice>,
}

#[derive(Debug, Deserialize)]
struct BirdeyePrice {
    #[serde(default)]
    value: Option<f64>,
}

/// CoinGecko for SOL, Birdeye for SPL tokens
pub struct HttpPriceFeed {
    client: Client,
    coingecko_base: String,
    birdeye_base: String,
    birdeye_api_key: Option<SecretString>,
}

impl HttpPriceFeed {
    pub fn new(config: &PriceConfig, birdeye_api_key: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            coingecko_base: config.coingecko_base.trim_end_matches('/').to_string(),
            birdeye_base: config.birdeye_base.trim_end_matches('/').to_string(),
            birdeye_api_key,
        }
    }

    fn native_price_request(&self) -> RequestBuilder {
        self.client
            .get(format!("{}/simple/price", self.coingecko_base))
            .query(&[("ids", "solana"), ("vs_currencies", "usd")])
    }

    // Birdeye's keyed `/defi/price` rather than the legacy `/public/price`
    // route; the key header is optional.
    fn token_price_request(&self, mint: &Pubkey) -> RequestBuilder {
        let request = self
            .client
            .get(format!("{}/defi/price", self.birdeye_base))
            .query(&[("address", mint.to_string())])
            .header("x-chain", "solana");
        match &self.birdeye_api_key {
            Some(key) => request.header("X-API-KEY", key.expose_secret()),
            None => request,
        }
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn native_asset_price_usd(&self) -> Result<f64> {
        let response = self
            .native_price_request()
            .send()
            .await
            .map_err(|e| Error::PriceUnavailable(format!("SOL price: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::PriceUnavailable(format!(
                "SOL price: HTTP {}",
                response.status()
            )));
        }

        let body: CoinGeckoSimplePrice = response
            .json()
            .await
            .map_err(|e| Error::PriceUnavailable(format!("SOL price: {}", e)))?;
        Ok(body.solana.usd)
    }

    async fn token_price_usd(&self, mint: &Pubkey) -> Result<Option<f64>> {
        let response = self
            .token_price_request(mint)
            .send()
            .await
            .map_err(|e| Error::PriceUnavailable(format!("{}: {}", mint, e)))?;

        if !response.status().is_success() {
            return Err(Error::PriceUnavailable(format!(
                "{}: HTTP {}",
                mint,
                response.status()
            )));
        }

        let body: BirdeyePriceResponse = response
            .json()
            .await
            .map_err(|e| Error::PriceUnavailable(format!("{}: {}", mint, e)))?;
        Ok(body.data.and_then(|d| d.value))
    }
}
