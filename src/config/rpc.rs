//! RPC endpoint configuration
//!
//! Resolution order:
//! 1. `SOLANA_RPC_URL` - explicit endpoint, highest priority
//! 2. `HELIUS_API_KEY` - Helius mainnet endpoint; the key is kept apart from
//!    the URL and attached as `api-key` only when a request is built
//! 3. Public mainnet-beta endpoint - rate limited, for testing only
//!
//! [`RpcConfig::default`] never reads the environment.
//!
//! # Examples
//!
//! ```bash
//! # Option 1: explicit URL (recommended)
//! export SOLANA_RPC_URL="https://my-node.example.com"
//!
//! # Option 2: Helius key
//! export HELIUS_API_KEY="YOUR_KEY"
//! ```

use secrecy::SecretString;
use serde::{Deserialize, Serialize, Serializer};

/// Environment variable names
pub mod env_vars {
    pub const SOLANA_RPC_URL: &str = "SOLANA_RPC_URL";
    pub const HELIUS_API_KEY: &str = "HELIUS_API_KEY";
}

/// Public mainnet-beta endpoint (rate limited)
pub const PUBLIC_MAINNET_RPC: &str = "https://api.mainnet-beta.solana.com";

/// Helius mainnet endpoint, used with an API key
pub const HELIUS_MAINNET_RPC: &str = "https://mainnet.helius-rpc.com/";

/// How finalized ledger state must be before a query or submission counts.
///
/// Variants are ordered from most recent to most final.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Commitment {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(crate::Error::Config(format!(
                "Unknown commitment level: {}",
                other
            ))),
        }
    }
}

/// RPC node settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint; query values are redacted when serialized
    #[serde(serialize_with = "serialize_redacted_url")]
    pub url: String,
    /// Provider key sent as the `api-key` query parameter
    #[serde(skip)]
    pub api_key: Option<SecretString>,
    /// Commitment used for queries, preflight and confirmation
    #[serde(default)]
    pub commitment: Commitment,
    /// Interval between signature status polls while confirming (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub confirm_poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Replace every query value in `raw` with `REDACTED`
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.query().is_some() => {
            let keys: Vec<String> = parsed.query_pairs().map(|(k, _)| k.into_owned()).collect();
            parsed
                .query_pairs_mut()
                .clear()
                .extend_pairs(keys.iter().map(|k| (k.as_str(), "REDACTED")));
            parsed.to_string()
        }
        _ => raw.to_string(),
    }
}

fn serialize_redacted_url<S: Serializer>(url: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&redact_url(url))
}

impl RpcConfig {
    /// Build RPC config from environment variables
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self::resolve(
            var(env_vars::SOLANA_RPC_URL),
            var(env_vars::HELIUS_API_KEY).map(SecretString::from),
        )
    }

    /// Apply the resolution order to already-read values
    pub fn resolve(explicit_url: Option<String>, helius_key: Option<SecretString>) -> Self {
        if let Some(url) = explicit_url {
            tracing::debug!("Using SOLANA_RPC_URL");
            Self::with_url(url)
        } else if let Some(key) = helius_key {
            tracing::info!("Using Helius RPC endpoint from HELIUS_API_KEY");
            Self {
                api_key: Some(key),
                ..Self::with_url(HELIUS_MAINNET_RPC)
            }
        } else {
            tracing::warn!("No RPC configured, using public mainnet-beta endpoint (rate limited)");
            Self::with_url(PUBLIC_MAINNET_RPC)
        }
    }

    /// Create with an explicit URL and default commitment
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            commitment: Commitment::default(),
            confirm_poll_interval_ms: default_poll_interval_ms(),
        }
    }

}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::with_url(PUBLIC_MAINNET_RPC)
    }
}
