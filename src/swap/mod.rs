//! Swap gateway
//!
//! Quotes and swap transactions come from an aggregator; the wallet only adds
//! its own signature and submits, either through a relay or straight to RPC.
//!
//! SECURITY NOTE:
//! - The aggregator never sees key material, only the public key
//! - Signatures already attached by the aggregator are preserved

pub mod jupiter;
pub mod relay;

pub use jupiter::JupiterClient;
pub use relay::HeliusRelay;

use crate::chain::ChainGateway;
use crate::config::Commitment;
use crate::tokens::TokenAmount;
use crate::wallet::SecureWallet;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;

/// Upper bound for slippage (100%)
pub const MAX_SLIPPAGE_BPS: u16 = 10_000;

/// Parameters of a quote request
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Input amount, already resolved to base units
    pub amount: TokenAmount,
    pub slippage_bps: u16,
}

/// The fields of an aggregator quote the wallet reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummary {
    pub input_mint: String,
    pub in_amount: String,
    pub output_mint: String,
    pub out_amount: String,
    #[serde(default)]
    pub other_amount_threshold: Option<String>,
    pub slippage_bps: u16,
    #[serde(default)]
    pub price_impact_pct: Option<String>,
}

/// A quote as returned by the aggregator
///
/// `raw` is sent back verbatim when building the swap transaction.
#[derive(Debug, Clone)]
pub struct SwapQuote {
    pub summary: QuoteSummary,
    pub raw: Value,
}

impl SwapQuote {
    pub fn from_value(raw: Value) -> Result<Self> {
        let summary = serde_json::from_value(raw.clone())
            .map_err(|e| Error::QuoteUnavailable(format!("unexpected quote shape: {}", e)))?;
        Ok(Self { summary, raw })
    }

    /// Expected output in base units of the output mint
    pub fn out_amount(&self) -> Result<u64> {
        self.summary
            .out_amount
            .parse()
            .map_err(|_| Error::QuoteUnavailable("quote outAmount is not an integer".to_string()))
    }
}

/// Quote and transaction-building API of a swap aggregator
#[async_trait]
pub trait SwapAggregator: Send + Sync {
    async fn quote(&self, request: &QuoteRequest) -> Result<SwapQuote>;

    /// Serialized, unsigned (or partially signed) versioned transaction
    async fn swap_transaction(&self, quote: &SwapQuote, user: &Pubkey) -> Result<Vec<u8>>;

    fn name(&self) -> &'static str;
}

/// Third-party submission endpoint for signed transactions
#[async_trait]
pub trait TransactionRelay: Send + Sync {
    async fn submit(&self, raw: &[u8], commitment: Commitment) -> Result<String>;
}

/// Full swap order as resolved by the workflow
#[derive(Debug, Clone, PartialEq)]
pub struct SwapOrder {
    pub quote: QuoteRequest,
    pub route_via_relay: bool,
}

/// Result of an executed swap
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub signature: String,
    pub quote: SwapQuote,
}

pub struct SwapGateway {
    aggregator: Arc<dyn SwapAggregator>,
    relay: Option<Arc<dyn TransactionRelay>>,
    chain: Arc<ChainGateway>,
}

impl SwapGateway {
    pub fn new(aggregator: Arc<dyn SwapAggregator>, chain: Arc<ChainGateway>) -> Self {
        Self {
            aggregator,
            relay: None,
            chain,
        }
    }

    pub fn with_relay(mut self, relay: Arc<dyn TransactionRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub async fn get_quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: TokenAmount,
        slippage_bps: u16,
    ) -> Result<SwapQuote> {
        if slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(Error::Validation(format!(
                "Slippage must be at most {} bps",
                MAX_SLIPPAGE_BPS
            )));
        }
        if amount.is_zero() {
            return Err(Error::Validation("Amount must be positive".to_string()));
        }

        let request = QuoteRequest {
            input_mint: *input_mint,
            output_mint: *output_mint,
            amount,
            slippage_bps,
        };
        let quote = self.aggregator.quote(&request).await?;
        tracing::debug!(
            aggregator = self.aggregator.name(),
            in_amount = %quote.summary.in_amount,
            out_amount = %quote.summary.out_amount,
            "Received swap quote"
        );
        Ok(quote)
    }

    pub async fn build_swap_transaction(&self, quote: &SwapQuote, user: &Pubkey) -> Result<Vec<u8>> {
        self.aggregator.swap_transaction(quote, user).await
    }

    /// Add the wallet's signature and submit
    pub async fn sign_and_submit(
        &self,
        signer: &SecureWallet,
        serialized: &[u8],
        route_via_relay: bool,
    ) -> Result<String> {
        let signed = partially_sign(signer, serialized)?;

        if route_via_relay {
            let relay = self.relay.as_ref().ok_or_else(|| {
                Error::RelaySubmitFailed("no relay configured".to_string())
            })?;
            let signature = relay.submit(&signed, self.chain.commitment()).await?;
            tracing::info!(signature = %signature, "Swap submitted via relay");
            Ok(signature)
        } else {
            self.chain.submit_raw(&signed).await
        }
    }

    /// Quote, build, sign and submit in one pass
    pub async fn execute(&self, signer: &SecureWallet, order: &SwapOrder) -> Result<SwapOutcome> {
        let quote = self
            .get_quote(
                &order.quote.input_mint,
                &order.quote.output_mint,
                order.quote.amount,
                order.quote.slippage_bps,
            )
            .await?;
        let unsigned = self.build_swap_transaction(&quote, &signer.pubkey()).await?;
        let signature = self
            .sign_and_submit(signer, &unsigned, order.route_via_relay)
            .await?;
        Ok(SwapOutcome { signature, quote })
    }
}

/// Place the wallet's signature in its slot of a versioned transaction
pub fn partially_sign(signer: &SecureWallet, serialized: &[u8]) -> Result<Vec<u8>> {
    let mut tx: VersionedTransaction = bincode::deserialize(serialized)
        .map_err(|e| Error::SwapBuildFailed(format!("undecodable transaction: {}", e)))?;

    let required = tx.message.header().num_required_signatures as usize;
    let index = tx
        .message
        .static_account_keys()
        .iter()
        .take(required)
        .position(|key| *key == signer.pubkey())
        .ok_or_else(|| {
            Error::SwapBuildFailed("wallet is not a required signer".to_string())
        })?;

    if tx.signatures.len() < required {
        tx.signatures.resize(required, Signature::default());
    }
    tx.signatures[index] = signer.sign_message(&tx.message.serialize());

    bincode::serialize(&tx)
        .map_err(|e| Error::SwapBuildFailed(format!("serialize signed transaction: {}", e)))
}
