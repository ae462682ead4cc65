//! In-memory doubles for the network seams

use crate::chain::rpc::ChainRpc;
use crate::chain::types::{
    LatestBlockhash, ParsedTransaction, RpcKeyedAccount, SignatureInfo, SignatureStatus,
};
use crate::config::Commitment;
use crate::prices::PriceFeed;
use crate::swap::{QuoteRequest, SwapAggregator, SwapQuote, TransactionRelay};
use crate::wallet::{KeyStore, SecureWallet, Session};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::json;
use solana_sdk::hash::Hash;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub fn wallet() -> SecureWallet {
    SecureWallet::from_secret_key_bytes(&Keypair::new().to_bytes()).unwrap()
}

/// Session with a freshly imported random key
pub async fn loaded_session() -> (Arc<Session>, Pubkey) {
    let session = Arc::new(Session::new(KeyStore::in_memory()));
    let pubkey = session
        .import_from_secret_key_bytes(&Keypair::new().to_bytes())
        .await
        .unwrap();
    (session, pubkey)
}

/// Serialized v0 transaction paying from `user`, optionally pre-signed by a cosigner
pub fn unsigned_swap_transaction(user: &Pubkey, cosigner: Option<&Keypair>) -> Vec<u8> {
    let mut instructions = vec![system_instruction::transfer(user, &Pubkey::new_unique(), 1)];
    if let Some(cosigner) = cosigner {
        instructions.push(system_instruction::transfer(&cosigner.pubkey(), user, 1));
    }
    let message = VersionedMessage::V0(
        v0::Message::try_compile(user, &instructions, &[], Hash::new_unique()).unwrap(),
    );

    let required = message.header().num_required_signatures as usize;
    let mut signatures = vec![Signature::default(); required];
    if let Some(cosigner) = cosigner {
        let idx = message
            .static_account_keys()
            .iter()
            .position(|k| *k == cosigner.pubkey())
            .unwrap();
        signatures[idx] = cosigner.sign_message(&message.serialize());
    }

    bincode::serialize(&VersionedTransaction {
        signatures,
        message,
    })
    .unwrap()
}

pub struct MockRpc {
    lamports: u64,
    token_accounts: Vec<RpcKeyedAccount>,
    signatures: Vec<SignatureInfo>,
    transactions: HashMap<String, ParsedTransaction>,
    fail_status: bool,
    fail_balance: bool,
    gate: Option<Arc<Notify>>,
    yield_on_balance: bool,
    pub sent: Mutex<Vec<Vec<u8>>>,
    pub calls: AtomicUsize,
    pub balance_calls: AtomicUsize,
    pub status_polls: AtomicUsize,
}

impl MockRpc {
    pub fn with_lamports(lamports: u64) -> Self {
        Self {
            lamports,
            token_accounts: Vec::new(),
            signatures: Vec::new(),
            transactions: HashMap::new(),
            fail_status: false,
            fail_balance: false,
            gate: None,
            yield_on_balance: false,
            sent: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            balance_calls: AtomicUsize::new(0),
            status_polls: AtomicUsize::new(0),
        }
    }

    pub fn with_token_account(self, mint: Pubkey, amount: u64, decimals: u8) -> Self {
        self.with_token_account_at(Pubkey::new_unique(), mint, amount, decimals)
    }

    pub fn with_token_account_at(
        mut self,
        account: Pubkey,
        mint: Pubkey,
        amount: u64,
        decimals: u8,
    ) -> Self {
        let keyed = serde_json::from_value(json!({
            "pubkey": account.to_string(),
            "account": {
                "data": {
                    "program": "spl-token",
                    "parsed": {
                        "type": "account",
                        "info": {
                            "mint": mint.to_string(),
                            "owner": Pubkey::new_unique().to_string(),
                            "tokenAmount": { "amount": amount.to_string(), "decimals": decimals }
                        }
                    }
                }
            }
        }))
        .unwrap();
        self.token_accounts.push(keyed);
        self
    }

    /// Add a history entry; `present = false` makes `getTransaction` return null
    pub fn with_signature(mut self, signature: &str, status: Option<&str>, present: bool) -> Self {
        let slot = 100 + self.signatures.len() as u64;
        self.signatures.push(
            serde_json::from_value(json!({
                "signature": signature,
                "slot": slot,
                "err": null,
                "blockTime": 1_700_000_000,
                "confirmationStatus": status,
            }))
            .unwrap(),
        );
        if present {
            self.transactions.insert(
                signature.to_string(),
                serde_json::from_value(json!({
                    "slot": slot,
                    "blockTime": 1_700_000_000,
                    "meta": { "fee": 5000, "err": null, "preBalances": [], "postBalances": [] },
                    "transaction": {
                        "signatures": [signature],
                        "message": { "accountKeys": [], "instructions": [] }
                    }
                }))
                .unwrap(),
            );
        }
        self
    }

    pub fn failing_status(mut self) -> Self {
        self.fail_status = true;
        self
    }

    pub fn failing_balance(mut self) -> Self {
        self.fail_balance = true;
        self
    }

    /// Hold every `sendTransaction` until the gate is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Yield to the scheduler inside `getBalance` so concurrent callers interleave
    pub fn yielding_balance(mut self) -> Self {
        self.yield_on_balance = true;
        self
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn get_balance(&self, _owner: &Pubkey, _commitment: Commitment) -> Result<u64> {
        self.hit();
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if self.yield_on_balance {
            tokio::task::yield_now().await;
        }
        if self.fail_balance {
            return Err(Error::ChainRequest("getBalance: connection refused".to_string()));
        }
        Ok(self.lamports)
    }

    async fn get_token_accounts_by_owner(
        &self,
        _owner: &Pubkey,
        _commitment: Commitment,
    ) -> Result<Vec<RpcKeyedAccount>> {
        self.hit();
        Ok(self.token_accounts.clone())
    }

    async fn get_signatures_for_address(
        &self,
        _address: &Pubkey,
        limit: usize,
        _commitment: Commitment,
    ) -> Result<Vec<SignatureInfo>> {
        self.hit();
        Ok(self.signatures.iter().take(limit).cloned().collect())
    }

    async fn get_transaction(
        &self,
        signature: &str,
        _commitment: Commitment,
    ) -> Result<Option<ParsedTransaction>> {
        self.hit();
        Ok(self.transactions.get(signature).cloned())
    }

    async fn get_latest_blockhash(&self, _commitment: Commitment) -> Result<LatestBlockhash> {
        self.hit();
        Ok(LatestBlockhash {
            blockhash: Hash::new_unique().to_string(),
            last_valid_block_height: 100,
        })
    }

    async fn send_transaction(&self, raw: &[u8], _preflight: Commitment) -> Result<String> {
        self.hit();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let tx: VersionedTransaction = bincode::deserialize(raw)
            .map_err(|e| Error::ChainRequest(format!("sendTransaction: {}", e)))?;
        self.sent.lock().unwrap().push(raw.to_vec());
        Ok(tx.signatures[0].to_string())
    }

    async fn get_signature_status(&self, _signature: &str) -> Result<Option<SignatureStatus>> {
        self.hit();
        self.status_polls.fetch_add(1, Ordering::SeqCst);
        let status = if self.fail_status {
            json!({ "slot": 1, "err": { "InstructionError": [0, { "Custom": 1 }] }, "confirmationStatus": "processed" })
        } else {
            json!({ "slot": 1, "err": null, "confirmationStatus": "finalized" })
        };
        Ok(Some(serde_json::from_value(status).unwrap()))
    }

    async fn get_block_height(&self, _commitment: Commitment) -> Result<u64> {
        self.hit();
        Ok(50)
    }
}

#[derive(Default)]
pub struct MockPrices {
    pub sol: Option<f64>,
    pub tokens: HashMap<Pubkey, f64>,
    pub calls: AtomicUsize,
}

impl MockPrices {
    pub fn sol(price: f64) -> Self {
        Self {
            sol: Some(price),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, mint: Pubkey, price: f64) -> Self {
        self.tokens.insert(mint, price);
        self
    }
}

#[async_trait]
impl PriceFeed for MockPrices {
    async fn native_asset_price_usd(&self) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sol
            .ok_or_else(|| Error::PriceUnavailable("SOL price: HTTP 429".to_string()))
    }

    async fn token_price_usd(&self, mint: &Pubkey) -> Result<Option<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .get(mint)
            .copied()
            .map(Some)
            .ok_or_else(|| Error::PriceUnavailable(format!("{}: HTTP 404", mint)))
    }
}

#[derive(Default)]
pub struct MockAggregator {
    pub requests: Mutex<Vec<QuoteRequest>>,
}

#[async_trait]
impl SwapAggregator for MockAggregator {
    async fn quote(&self, request: &QuoteRequest) -> Result<SwapQuote> {
        self.requests.lock().unwrap().push(request.clone());
        SwapQuote::from_value(json!({
            "inputMint": request.input_mint.to_string(),
            "inAmount": request.amount.base_units.to_string(),
            "outputMint": request.output_mint.to_string(),
            "outAmount": "1000",
            "slippageBps": request.slippage_bps,
            "priceImpactPct": "0"
        }))
    }

    async fn swap_transaction(&self, _quote: &SwapQuote, user: &Pubkey) -> Result<Vec<u8>> {
        Ok(unsigned_swap_transaction(user, None))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[derive(Default)]
pub struct MockRelay {
    pub submitted: Mutex<Vec<(Vec<u8>, Commitment)>>,
}

#[async_trait]
impl TransactionRelay for MockRelay {
    async fn submit(&self, raw: &[u8], commitment: Commitment) -> Result<String> {
        self.submitted.lock().unwrap().push((raw.to_vec(), commitment));
        Ok("relay-signature".to_string())
    }
}
