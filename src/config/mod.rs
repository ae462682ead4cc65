//! Configuration for the wallet client

pub mod rpc;

use crate::wallet::keystore::KdfParams;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// Re-export RPC config
pub use rpc::{Commitment, RpcConfig};

/// Relay API key environment variable name
pub const HELIUS_API_KEY_ENV: &str = "HELIUS_API_KEY";
/// Birdeye API key environment variable name
pub const BIRDEYE_API_KEY_ENV: &str = "BIRDEYE_API_KEY";
/// Key store passphrase environment variable name
pub const KEYSTORE_PASSPHRASE_ENV: &str = "EATSOL_KEYSTORE_PASSPHRASE";
/// Seed phrase or secret key for the import commands
pub const IMPORT_SECRET_ENV: &str = "EATSOL_IMPORT_SECRET";

/// Jupiter aggregator endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupiterConfig {
    pub quote_url: String,
    pub swap_url: String,
}

impl Default for JupiterConfig {
    fn default() -> Self {
        Self {
            quote_url: "https://quote-api.jup.ag/v6/quote".to_string(),
            swap_url: "https://quote-api.jup.ag/v6/swap".to_string(),
        }
    }
}

/// Third-party transaction relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay endpoint; the API key is appended as `api-key` query parameter
    pub url: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "https://api.helius.xyz/v0/transactions".to_string(),
        }
    }
}

/// Price oracle endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    pub coingecko_base: String,
    pub birdeye_base: String,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            coingecko_base: "https://api.coingecko.com/api/v3".to_string(),
            birdeye_base: "https://public-api.birdeye.so".to_string(),
        }
    }
}

/// Fee charged when closing an empty token account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Fee in lamports (0.00005 SOL)
    pub close_account_fee_lamports: u64,
    /// Fee-collection wallet (base58)
    pub fee_wallet: String,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            close_account_fee_lamports: 50_000,
            fee_wallet: "EAT5eyaiBWCMy2k2AJQQxP3WsZXXdcWzfCYgXcaTPQTa".to_string(),
        }
    }
}

impl FeeConfig {
    pub fn fee_wallet_pubkey(&self) -> crate::Result<Pubkey> {
        Pubkey::from_str(&self.fee_wallet)
            .map_err(|e| crate::Error::Config(format!("Invalid fee wallet: {}", e)))
    }
}

/// Workflow tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Minimum seconds between unforced refreshes
    pub refresh_cooldown_secs: u64,
    /// Number of signatures fetched for history
    pub history_limit: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            refresh_cooldown_secs: 120,
            history_limit: crate::chain::DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Encrypted key store location and key-derivation cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreConfig {
    pub dir: PathBuf,
    /// Argon2id costs for new writes
    #[serde(default)]
    pub kdf: KdfParams,
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".eatsol"),
            kdf: KdfParams::default(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Falls back to the environment when the section is absent
    #[serde(default = "RpcConfig::from_env")]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub jupiter: JupiterConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub prices: PriceConfig,
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub keystore: KeystoreConfig,
    /// Path to the JSONL audit log
    #[serde(default)]
    pub audit_log_path: Option<String>,
}

impl Config {
    /// Defaults, with the RPC endpoint resolved from the environment
    pub fn from_env() -> Self {
        Self {
            rpc: RpcConfig::from_env(),
            ..Default::default()
        }
    }

    /// Load a JSON config file; missing sections take their defaults
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check endpoint URLs and the fee wallet
    pub fn validate(&self) -> crate::Result<()> {
        for (name, value) in [
            ("rpc.url", &self.rpc.url),
            ("jupiter.quote_url", &self.jupiter.quote_url),
            ("jupiter.swap_url", &self.jupiter.swap_url),
            ("relay.url", &self.relay.url),
            ("prices.coingecko_base", &self.prices.coingecko_base),
            ("prices.birdeye_base", &self.prices.birdeye_base),
        ] {
            url::Url::parse(value)
                .map_err(|e| crate::Error::Config(format!("{} is not a valid URL: {}", name, e)))?;
        }
        self.fees.fee_wallet_pubkey()?;
        if self.workflow.history_limit == 0 || self.workflow.history_limit > 1000 {
            return Err(crate::Error::Config(
                "workflow.history_limit must be between 1 and 1000".to_string(),
            ));
        }
        Ok(())
    }
}

/// Secrets read from the environment; never serialized
#[derive(Debug, Default)]
pub struct Secrets {
    pub relay_api_key: Option<SecretString>,
    pub birdeye_api_key: Option<SecretString>,
    pub keystore_passphrase: Option<SecretString>,
    pub import_secret: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .map(SecretString::from)
        };
        Self {
            relay_api_key: read(HELIUS_API_KEY_ENV),
            birdeye_api_key: read(BIRDEYE_API_KEY_ENV),
            keystore_passphrase: read(KEYSTORE_PASSPHRASE_ENV),
            import_secret: read(IMPORT_SECRET_ENV),
        }
    }
}
