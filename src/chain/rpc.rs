//! Solana JSON-RPC transport
//!
//! [`ChainRpc`] is the seam the gateway talks through. [`HttpRpcClient`]
//! speaks JSON-RPC 2.0 over `reqwest`; tests substitute an in-memory double.

use crate::chain::types::{
    LatestBlockhash, ParsedTransaction, RpcKeyedAccount, RpcResponse, SignatureInfo,
    SignatureStatus,
};
use crate::config::{Commitment, RpcConfig};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use std::sync::atomic::{AtomicU64, Ordering};

/// RPC calls used by the wallet
///
/// Commitment is passed per call; implementations must not assume a default.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Lamport balance of an account
    async fn get_balance(&self, owner: &Pubkey, commitment: Commitment) -> Result<u64>;

    /// SPL Token accounts owned by `owner`, `jsonParsed`
    async fn get_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        commitment: Commitment,
    ) -> Result<Vec<RpcKeyedAccount>>;

    /// Most recent signatures first
    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
        commitment: Commitment,
    ) -> Result<Vec<SignatureInfo>>;

    /// `None` when the node has no record of the transaction
    async fn get_transaction(
        &self,
        signature: &str,
        commitment: Commitment,
    ) -> Result<Option<ParsedTransaction>>;

    async fn get_latest_blockhash(&self, commitment: Commitment) -> Result<LatestBlockhash>;

    /// Submit a serialized transaction with preflight enabled; returns the signature
    async fn send_transaction(&self, raw: &[u8], preflight: Commitment) -> Result<String>;

    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>>;

    async fn get_block_height(&self, commitment: Commitment) -> Result<u64>;
}

#[derive(Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Decode a JSON-RPC response body into `T`
///
/// A `null` result is handed to `T` as-is, so `Option<_>` targets yield `None`.
fn decode_envelope<T: DeserializeOwned>(method: &str, body: Value) -> Result<T> {
    let envelope: RpcEnvelope = serde_json::from_value(body)
        .map_err(|e| Error::ChainRequest(format!("{}: malformed response: {}", method, e)))?;

    if let Some(err) = envelope.error {
        return Err(Error::ChainRequest(format!(
            "{}: {} (code {})",
            method, err.message, err.code
        )));
    }

    serde_json::from_value(envelope.result.unwrap_or(Value::Null))
        .map_err(|e| Error::ChainRequest(format!("{}: unexpected result: {}", method, e)))
}

/// One JSON-RPC method invocation
#[derive(Debug)]
struct RpcCall {
    method: &'static str,
    params: Value,
}

impl RpcCall {
    fn new(method: &'static str, params: Value) -> Self {
        Self { method, params }
    }

    fn get_balance(owner: &Pubkey, commitment: Commitment) -> Self {
        Self::new(
            "getBalance",
            json!([owner.to_string(), { "commitment": commitment.as_str() }]),
        )
    }

    fn get_token_accounts_by_owner(owner: &Pubkey, commitment: Commitment) -> Self {
        Self::new(
            "getTokenAccountsByOwner",
            json!([
                owner.to_string(),
                { "programId": spl_token::id().to_string() },
                { "encoding": "jsonParsed", "commitment": commitment.as_str() }
            ]),
        )
    }

    fn get_signatures_for_address(address: &Pubkey, limit: usize, commitment: Commitment) -> Self {
        Self::new(
            "getSignaturesForAddress",
            json!([
                address.to_string(),
                { "limit": limit, "commitment": commitment.as_str() }
            ]),
        )
    }

    fn get_transaction(signature: &str, commitment: Commitment) -> Self {
        Self::new(
            "getTransaction",
            json!([
                signature,
                {
                    "encoding": "jsonParsed",
                    "commitment": commitment.as_str(),
                    "maxSupportedTransactionVersion": 0
                }
            ]),
        )
    }

    fn get_latest_blockhash(commitment: Commitment) -> Self {
        Self::new(
            "getLatestBlockhash",
            json!([{ "commitment": commitment.as_str() }]),
        )
    }

    fn send_transaction(raw: &[u8], preflight: Commitment) -> Self {
        Self::new(
            "sendTransaction",
            json!([
                BASE64.encode(raw),
                {
                    "encoding": "base64",
                    "skipPreflight": false,
                    "preflightCommitment": preflight.as_str()
                }
            ]),
        )
    }

    fn get_signature_statuses(signature: &str) -> Self {
        Self::new("getSignatureStatuses", json!([[signature]]))
    }

    fn get_block_height(commitment: Commitment) -> Self {
        Self::new(
            "getBlockHeight",
            json!([{ "commitment": commitment.as_str() }]),
        )
    }
}

/// JSON-RPC client over HTTP
pub struct HttpRpcClient {
    client: Client,
    url: String,
    api_key: Option<SecretString>,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            api_key: None,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &RpcConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            ..Self::new(config.url.clone())
        }
    }

    fn request(&self, call: &RpcCall, id: u64) -> RequestBuilder {
        let mut builder = self.client.post(&self.url);
        if let Some(key) = &self.api_key {
            builder = builder.query(&[("api-key", key.expose_secret())]);
        }
        builder.json(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": call.method,
            "params": call.params,
        }))
    }

    async fn call<T: DeserializeOwned>(&self, call: RpcCall) -> Result<T> {
        let method = call.method;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(method, id, "RPC request");

        let response = self
            .request(&call, id)
            .send()
            .await
            .map_err(|e| Error::ChainRequest(format!("{}: {}", method, e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ChainRequest(format!(
                "{}: HTTP {}",
                method, status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::ChainRequest(format!("{}: {}", method, e.without_url())))?;

        decode_envelope(method, body)
    }
}

#[async_trait]
impl ChainRpc for HttpRpcClient {
    async fn get_balance(&self, owner: &Pubkey, commitment: Commitment) -> Result<u64> {
        let response: RpcResponse<u64> =
            self.call(RpcCall::get_balance(owner, commitment)).await?;
        Ok(response.value)
    }

    async fn get_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        commitment: Commitment,
    ) -> Result<Vec<RpcKeyedAccount>> {
        let response: RpcResponse<Vec<RpcKeyedAccount>> = self
            .call(RpcCall::get_token_accounts_by_owner(owner, commitment))
            .await?;
        Ok(response.value)
    }

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
        commitment: Commitment,
    ) -> Result<Vec<SignatureInfo>> {
        self.call(RpcCall::get_signatures_for_address(address, limit, commitment))
            .await
    }

    async fn get_transaction(
        &self,
        signature: &str,
        commitment: Commitment,
    ) -> Result<Option<ParsedTransaction>> {
        self.call(RpcCall::get_transaction(signature, commitment)).await
    }

    async fn get_latest_blockhash(&self, commitment: Commitment) -> Result<LatestBlockhash> {
        let response: RpcResponse<LatestBlockhash> =
            self.call(RpcCall::get_latest_blockhash(commitment)).await?;
        Ok(response.value)
    }

    async fn send_transaction(&self, raw: &[u8], preflight: Commitment) -> Result<String> {
        self.call(RpcCall::send_transaction(raw, preflight)).await
    }

    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>> {
        let response: RpcResponse<Vec<Option<SignatureStatus>>> =
            self.call(RpcCall::get_signature_statuses(signature)).await?;
        Ok(response.value.into_iter().next().flatten())
    }

    async fn get_block_height(&self, commitment: Commitment) -> Result<u64> {
        self.call(RpcCall::get_block_height(commitment)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wrapped_value() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": { "context": { "slot": 1 }, "value": 1_500_000_000u64 }
        });
        let response: RpcResponse<u64> = decode_envelope("getBalance", body).unwrap();
        assert_eq!(response.value, 1_500_000_000);
    }

    #[test]
    fn null_result_is_none() {
        let body = json!({ "jsonrpc": "2.0", "id": 2, "result": null });
        let tx: Option<ParsedTransaction> = decode_envelope("getTransaction", body).unwrap();
        assert!(tx.is_none());
    }

    #[test]
    fn rpc_error_becomes_chain_request() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 3,
            "error": { "code": -32002, "message": "Transaction simulation failed" }
        });
        let err = decode_envelope::<String>("sendTransaction", body).unwrap_err();
        match err {
            Error::ChainRequest(msg) => {
                assert!(msg.contains("sendTransaction"));
                assert!(msg.contains("-32002"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn mistyped_result_is_rejected() {
        let body = json!({ "jsonrpc": "2.0", "id": 4, "result": "not a number" });
        assert!(decode_envelope::<u64>("getBlockHeight", body).is_err());
    }

    #[test]
    fn signature_statuses_shape() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 5,
            "result": {
                "context": { "slot": 10 },
                "value": [{ "slot": 9, "confirmations": null, "err": null, "confirmationStatus": "finalized" }]
            }
        });
        let response: RpcResponse<Vec<Option<SignatureStatus>>> =
            decode_envelope("getSignatureStatuses", body).unwrap();
        let status = response.value.into_iter().next().flatten().unwrap();
        assert_eq!(status.confirmation_status, Some(Commitment::Finalized));
    }

    fn built(client: &HttpRpcClient, call: RpcCall) -> (reqwest::Request, Value) {
        let request = client.request(&call, 7).build().unwrap();
        let body = serde_json::from_slice(request.body().unwrap().as_bytes().unwrap()).unwrap();
        (request, body)
    }

    #[test]
    fn api_key_is_attached_per_request() {
        let config = RpcConfig::resolve(None, Some(SecretString::from("KEY-1".to_string())));
        let client = HttpRpcClient::from_config(&config);
        let (request, body) = built(&client, RpcCall::get_block_height(Commitment::Finalized));

        assert_eq!(request.method(), &reqwest::Method::POST);
        assert_eq!(request.url().host_str(), Some("mainnet.helius-rpc.com"));
        let pairs: Vec<(String, String)> = request.url().query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("api-key".to_string(), "KEY-1".to_string())]);
        assert_eq!(
            body,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "getBlockHeight",
                "params": [{ "commitment": "finalized" }]
            })
        );

        let plain = HttpRpcClient::new("https://rpc.example.com");
        let (request, _) = built(&plain, RpcCall::get_block_height(Commitment::Confirmed));
        assert!(request.url().query().is_none());
    }

    #[test]
    fn query_method_params() {
        let client = HttpRpcClient::new("https://rpc.example.com");
        let owner = Pubkey::new_unique();

        let (_, body) = built(&client, RpcCall::get_balance(&owner, Commitment::Confirmed));
        assert_eq!(body["method"], "getBalance");
        assert_eq!(body["params"], json!([owner.to_string(), { "commitment": "confirmed" }]));

        let (_, body) = built(
            &client,
            RpcCall::get_token_accounts_by_owner(&owner, Commitment::Confirmed),
        );
        assert_eq!(body["method"], "getTokenAccountsByOwner");
        assert_eq!(body["params"][1]["programId"], spl_token::id().to_string());
        assert_eq!(body["params"][2]["encoding"], "jsonParsed");

        let (_, body) = built(
            &client,
            RpcCall::get_signatures_for_address(&owner, 20, Commitment::Finalized),
        );
        assert_eq!(body["method"], "getSignaturesForAddress");
        assert_eq!(body["params"][1], json!({ "limit": 20, "commitment": "finalized" }));

        let (_, body) = built(&client, RpcCall::get_transaction("5sig", Commitment::Confirmed));
        assert_eq!(body["method"], "getTransaction");
        assert_eq!(body["params"][0], "5sig");
        assert_eq!(body["params"][1]["maxSupportedTransactionVersion"], 0);
        assert_eq!(body["params"][1]["encoding"], "jsonParsed");

        let (_, body) = built(&client, RpcCall::get_signature_statuses("5sig"));
        assert_eq!(body["method"], "getSignatureStatuses");
        assert_eq!(body["params"], json!([["5sig"]]));

        let (_, body) = built(&client, RpcCall::get_latest_blockhash(Commitment::Processed));
        assert_eq!(body["method"], "getLatestBlockhash");
        assert_eq!(body["params"], json!([{ "commitment": "processed" }]));
    }

    #[test]
    fn send_transaction_is_preflighted_base64() {
        let client = HttpRpcClient::new("https://rpc.example.com");
        let (_, body) = built(
            &client,
            RpcCall::send_transaction(&[1, 2, 3], Commitment::Confirmed),
        );
        assert_eq!(body["method"], "sendTransaction");
        assert_eq!(
            body["params"],
            json!([
                "AQID",
                { "encoding": "base64", "skipPreflight": false, "preflightCommitment": "confirmed" }
            ])
        );
    }
}
