//! Self-custodial Solana wallet client
//!
//! A wallet that:
//! - Imports a key from a BIP-39 phrase or raw secret-key bytes
//! - Shows SOL and SPL token balances, USD values and recent history
//! - Sends SOL and tokens, closes empty token accounts
//! - Swaps through the Jupiter aggregator, optionally via a relay
//!
//! # Security Model
//!
//! - Private keys never leave the `wallet` module except into the encrypted key store
//! - Nothing is signed without an explicit confirmation step
//! - Page content in an embedded browser can never trigger signing
//! - Settled actions are recorded in an append-only audit trail

pub mod audit;
pub mod bridge;
pub mod chain;
pub mod config;
pub mod prices;
pub mod swap;
pub mod tokens;
pub mod wallet;
pub mod workflow;

mod error;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{Commitment, Config, RpcConfig, Secrets};
pub use error::{Error, Result};
pub use wallet::Session;
pub use workflow::TransactionWorkflow;
