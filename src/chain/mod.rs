//! Chain gateway
//!
//! Balance and history queries plus the three wallet-initiated transaction
//! kinds: native transfer, token transfer and closing an empty token
//! account. Each submission is signed locally, sent with preflight and then
//! polled until it reaches the configured commitment.

pub mod rpc;
pub mod types;

pub use rpc::{ChainRpc, HttpRpcClient};
pub use types::{TokenHolding, TransactionRecord, WalletBalances};

use crate::config::{Commitment, RpcConfig};
use crate::tokens::{lamports_to_sol, TokenAmount, SOL_DECIMALS};
use crate::wallet::SecureWallet;
use crate::{Error, Result};
use futures::future::join_all;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;
use spl_associated_token_account_client::address::get_associated_token_address;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default number of history entries
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

pub struct ChainGateway {
    rpc: Arc<dyn ChainRpc>,
    commitment: Commitment,
    poll_interval: Duration,
}

impl ChainGateway {
    pub fn new(rpc: Arc<dyn ChainRpc>, config: &RpcConfig) -> Self {
        Self {
            rpc,
            commitment: config.commitment,
            poll_interval: Duration::from_millis(config.confirm_poll_interval_ms),
        }
    }

    pub fn commitment(&self) -> Commitment {
        self.commitment
    }

    /// Native and SPL token balances, fetched concurrently
    pub async fn get_balances(&self, owner: &Pubkey) -> Result<WalletBalances> {
        let (lamports, accounts) = tokio::try_join!(
            self.rpc.get_balance(owner, self.commitment),
            self.rpc.get_token_accounts_by_owner(owner, self.commitment),
        )?;

        let token_holdings = accounts
            .into_iter()
            .map(TokenHolding::try_from)
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            owner = %owner,
            lamports,
            token_accounts = token_holdings.len(),
            "Fetched balances"
        );

        Ok(WalletBalances {
            lamports,
            native_balance: lamports_to_sol(lamports),
            token_holdings,
        })
    }

    /// Confirmed or finalized transactions, most recent first
    pub async fn get_recent_transactions(
        &self,
        owner: &Pubkey,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>> {
        // History never reads below confirmed
        let commitment = self.commitment.max(Commitment::Confirmed);
        let signatures = self
            .rpc
            .get_signatures_for_address(owner, limit, commitment)
            .await?;

        let confirmed: Vec<_> = signatures
            .into_iter()
            .filter(|info| info.is_confirmed())
            .collect();

        let details = join_all(
            confirmed
                .iter()
                .map(|info| self.rpc.get_transaction(&info.signature, commitment)),
        )
        .await;

        let mut records = Vec::with_capacity(confirmed.len());
        for (info, detail) in confirmed.into_iter().zip(details) {
            if let Some(detail) = detail? {
                records.push(TransactionRecord {
                    signature: info.signature,
                    slot: info.slot,
                    block_time: info.block_time.or(detail.block_time),
                    detail,
                });
            }
        }

        tracing::debug!(owner = %owner, count = records.len(), "Fetched history");
        Ok(records)
    }

    /// Send SOL from the signer to `destination`
    pub async fn transfer_native(
        &self,
        signer: &SecureWallet,
        destination: &Pubkey,
        amount: TokenAmount,
    ) -> Result<String> {
        if amount.decimals != SOL_DECIMALS {
            return Err(Error::Validation(format!(
                "native amount must have {} decimals",
                SOL_DECIMALS
            )));
        }
        if amount.is_zero() {
            return Err(Error::Validation("Amount must be positive".to_string()));
        }

        let instruction =
            system_instruction::transfer(&signer.pubkey(), destination, amount.base_units);

        tracing::info!(
            from = %signer.pubkey(),
            to = %destination,
            lamports = amount.base_units,
            "Submitting native transfer"
        );
        self.sign_send_confirm(signer, &[instruction]).await
    }

    /// Send SPL tokens between the associated token accounts of signer and destination
    pub async fn transfer_token(
        &self,
        signer: &SecureWallet,
        destination: &Pubkey,
        mint: &Pubkey,
        amount: TokenAmount,
    ) -> Result<String> {
        if amount.is_zero() {
            return Err(Error::Validation("Amount must be positive".to_string()));
        }

        let owner = signer.pubkey();
        let source_ata = get_associated_token_address(&owner, mint);
        let destination_ata = get_associated_token_address(destination, mint);

        let instruction = spl_token::instruction::transfer_checked(
            &spl_token::id(),
            &source_ata,
            mint,
            &destination_ata,
            &owner,
            &[],
            amount.base_units,
            amount.decimals,
        )
        .map_err(|e| Error::ChainRequest(format!("token transfer instruction: {}", e)))?;

        tracing::info!(
            from = %owner,
            to = %destination,
            mint = %mint,
            amount = amount.base_units,
            decimals = amount.decimals,
            "Submitting token transfer"
        );
        self.sign_send_confirm(signer, &[instruction]).await
    }

    /// Close a token account, returning its rent to the signer, and pay the
    /// service fee in the same transaction.
    ///
    /// The caller is responsible for checking the account is empty.
    pub async fn close_empty_token_account(
        &self,
        signer: &SecureWallet,
        token_account: &Pubkey,
        fee_destination: &Pubkey,
        fee_lamports: u64,
    ) -> Result<String> {
        let owner = signer.pubkey();
        let close = spl_token::instruction::close_account(
            &spl_token::id(),
            token_account,
            &owner,
            &owner,
            &[],
        )
        .map_err(|e| Error::ChainRequest(format!("close account instruction: {}", e)))?;

        let mut instructions = vec![close];
        if fee_lamports > 0 {
            instructions.push(system_instruction::transfer(
                &owner,
                fee_destination,
                fee_lamports,
            ));
        }

        tracing::info!(
            owner = %owner,
            token_account = %token_account,
            fee_lamports,
            "Submitting close account"
        );
        self.sign_send_confirm(signer, &instructions).await
    }

    /// Send an already-signed transaction without waiting for confirmation
    pub async fn submit_raw(&self, raw: &[u8]) -> Result<String> {
        let signature = self.rpc.send_transaction(raw, self.commitment).await?;
        tracing::info!(signature = %signature, "Submitted raw transaction");
        Ok(signature)
    }

    async fn sign_send_confirm(
        &self,
        signer: &SecureWallet,
        instructions: &[Instruction],
    ) -> Result<String> {
        let latest = self.rpc.get_latest_blockhash(self.commitment).await?;
        let blockhash = Hash::from_str(&latest.blockhash)
            .map_err(|e| Error::ChainRequest(format!("invalid blockhash: {}", e)))?;

        let payer = signer.pubkey();
        let transaction = Transaction::new_signed_with_payer(
            instructions,
            Some(&payer),
            &[signer.keypair()],
            blockhash,
        );
        let raw = bincode::serialize(&transaction)
            .map_err(|e| Error::ChainRequest(format!("serialize transaction: {}", e)))?;

        let signature = self.rpc.send_transaction(&raw, self.commitment).await?;
        tracing::info!(signature = %signature, "Transaction sent, awaiting confirmation");

        self.await_confirmation(&signature, latest.last_valid_block_height)
            .await?;
        tracing::info!(
            signature = %signature,
            commitment = %self.commitment,
            "Transaction confirmed"
        );
        Ok(signature)
    }

    /// Poll until the signature reaches the configured commitment, fails, or
    /// its blockhash expires.
    async fn await_confirmation(&self, signature: &str, last_valid_block_height: u64) -> Result<()> {
        loop {
            if let Some(status) = self.rpc.get_signature_status(signature).await? {
                if let Some(err) = status.err {
                    return Err(Error::ChainRequest(format!(
                        "transaction {} failed: {}",
                        signature, err
                    )));
                }
                if status
                    .confirmation_status
                    .is_some_and(|level| level >= self.commitment)
                {
                    return Ok(());
                }
            }

            let height = self.rpc.get_block_height(self.commitment).await?;
            if height > last_valid_block_height {
                return Err(Error::ChainRequest(format!(
                    "blockhash expired before {} was confirmed",
                    signature
                )));
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
