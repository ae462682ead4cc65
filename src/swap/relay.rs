//! Helius transaction relay
//!
//! The API key travels as the `api-key` query parameter and is never logged.

use crate::config::{Commitment, RelayConfig};
use crate::swap::TransactionRelay;
use crate::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct RelayResponse {
    signature: String,
}

pub struct HeliusRelay {
    client: Client,
    url: String,
    api_key: SecretString,
}

impl HeliusRelay {
    pub fn new(config: &RelayConfig, api_key: SecretString) -> Self {
        Self {
            client: Client::new(),
            url: config.url.clone(),
            api_key,
        }
    }

    fn submit_request(&self, raw: &[u8], commitment: Commitment) -> RequestBuilder {
        self.client
            .post(&self.url)
            .query(&[("api-key", self.api_key.expose_secret())])
            .json(&json!({
                "transaction": BASE64.encode(raw),
                "commitment": commitment.as_str(),
            }))
    }
}

#[async_trait]
impl TransactionRelay for HeliusRelay {
    async fn submit(&self, raw: &[u8], commitment: Commitment) -> Result<String> {
        let response = self
            .submit_request(raw, commitment)
            .send()
            .await
            .map_err(|e| Error::RelaySubmitFailed(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RelaySubmitFailed(format!("HTTP {}", status)));
        }

        let body: RelayResponse = response
            .json()
            .await
            .map_err(|e| Error::RelaySubmitFailed(format!("unexpected response: {}", e.without_url())))?;

        Ok(body.signature)
    }
}
