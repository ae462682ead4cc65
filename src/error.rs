//! Error types for the wallet client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("RPC request failed: {0}")]
    ChainRequest(String),

    #[error("Swap quote unavailable: {0}")]
    QuoteUnavailable(String),

    #[error("Swap transaction build failed: {0}")]
    SwapBuildFailed(String),

    #[error("Relay submission failed: {0}")]
    RelaySubmitFailed(String),

    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("Key store error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No wallet loaded")]
    NoActiveWallet,

    #[error("Another action is already in progress")]
    Busy,

    #[error("Refresh limited: try again in {remaining_secs} seconds")]
    RefreshThrottled { remaining_secs: u64 },

    #[error("Invalid workflow state: {0}")]
    InvalidState(String),

    /// A confirmed action that settled as a failure
    #[error("{message} [{category}]")]
    ActionFailed {
        category: &'static str,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Short, stable category string safe to show to the user.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::InvalidMnemonic(_) | Error::InvalidKeyMaterial(_) => "key_import",
            Error::ChainRequest(_) => "chain_request",
            Error::QuoteUnavailable(_) => "quote_unavailable",
            Error::SwapBuildFailed(_) => "swap_build",
            Error::RelaySubmitFailed(_) => "relay_submit",
            Error::PriceUnavailable(_) => "price",
            Error::Storage(_) => "storage",
            Error::Config(_) => "config",
            Error::NoActiveWallet => "no_wallet",
            Error::Busy => "busy",
            Error::RefreshThrottled { .. } => "refresh_throttled",
            Error::InvalidState(_) => "invalid_state",
            Error::ActionFailed { category, .. } => category,
            Error::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
