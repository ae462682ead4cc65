//! Shared token registry and unit conversion
//!
//! Every conversion between user-facing decimal amounts and on-chain base
//! units goes through [`TokenAmount`], for native transfers, token transfers
//! and swaps alike.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::str::FromStr;

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
/// Decimals of the native asset
pub const SOL_DECIMALS: u8 = 9;
/// Wrapped SOL mint, used by the aggregator and price map for the native asset
pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Token metadata
#[derive(Debug, Clone, Copy)]
pub struct TokenInfo {
    /// Token symbol (e.g., "USDC", "SOL")
    pub symbol: &'static str,
    /// Mint address (base58)
    pub mint: &'static str,
    /// Number of decimals
    pub decimals: u8,
}

impl TokenInfo {
    pub const fn new(symbol: &'static str, mint: &'static str, decimals: u8) -> Self {
        Self {
            symbol,
            mint,
            decimals,
        }
    }
}

/// Well-known mainnet mints
pub mod mints {
    pub const WSOL: &str = super::WRAPPED_SOL_MINT;
    pub const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    pub const USDT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";
    pub const JUP: &str = "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN";
    pub const BONK: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";
}

/// Token registry providing lookups by mint or symbol
pub struct TokenRegistry {
    by_mint: HashMap<&'static str, TokenInfo>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        let known = [
            TokenInfo::new("SOL", mints::WSOL, SOL_DECIMALS),
            TokenInfo::new("USDC", mints::USDC, 6),
            TokenInfo::new("USDT", mints::USDT, 6),
            TokenInfo::new("JUP", mints::JUP, 6),
            TokenInfo::new("BONK", mints::BONK, 5),
        ];
        let by_mint = known.into_iter().map(|info| (info.mint, info)).collect();
        Self { by_mint }
    }

    /// Get token info by mint address
    pub fn get(&self, mint: &str) -> Option<&TokenInfo> {
        self.by_mint.get(mint)
    }

    /// Get token info by symbol (case-insensitive)
    pub fn by_symbol(&self, symbol: &str) -> Option<&TokenInfo> {
        self.by_mint
            .values()
            .find(|info| info.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Resolve a symbol or base58 mint into a mint pubkey
    pub fn resolve_mint(&self, symbol_or_mint: &str) -> Result<Pubkey> {
        let mint = self
            .by_symbol(symbol_or_mint)
            .map(|info| info.mint)
            .unwrap_or(symbol_or_mint);
        Pubkey::from_str(mint)
            .map_err(|_| Error::Validation(format!("Unknown token or mint: {}", symbol_or_mint)))
    }

    /// Display symbol for a mint, falling back to a shortened mint
    pub fn symbol_for(&self, mint: &str) -> String {
        match self.get(mint) {
            Some(info) => info.symbol.to_string(),
            None => mint.chars().take(4).collect(),
        }
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global token registry (lazy initialized)
static REGISTRY: std::sync::OnceLock<TokenRegistry> = std::sync::OnceLock::new();

/// Get the global token registry
pub fn registry() -> &'static TokenRegistry {
    REGISTRY.get_or_init(TokenRegistry::new)
}

/// An amount in base units together with the decimals it is scaled by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub base_units: u64,
    pub decimals: u8,
}

impl TokenAmount {
    pub fn from_base_units(base_units: u64, decimals: u8) -> Self {
        Self {
            base_units,
            decimals,
        }
    }

    pub fn lamports(lamports: u64) -> Self {
        Self::from_base_units(lamports, SOL_DECIMALS)
    }

    /// Parse a user-entered decimal string ("1.25") into base units.
    ///
    /// Exact: no float rounding. More fractional digits than `decimals`
    /// is an error rather than a silent truncation.
    pub fn parse(input: &str, decimals: u8) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("Amount is required".to_string()));
        }

        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
            return Err(Error::Validation(format!("Amount is not a number: {}", input)));
        }
        if frac.len() > decimals as usize {
            return Err(Error::Validation(format!(
                "Amount has more than {} decimal places",
                decimals
            )));
        }

        let overflow = || Error::Validation(format!("Amount is too large: {}", input));
        let scale = 10u64.checked_pow(decimals as u32).ok_or_else(overflow)?;
        let whole_units: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let frac_units: u64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = decimals as usize);
            padded.parse().map_err(|_| overflow())?
        };

        let base_units = whole_units
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac_units))
            .ok_or_else(overflow)?;

        Ok(Self {
            base_units,
            decimals,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.base_units == 0
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_units(self.base_units, self.decimals))
    }
}

/// Base units to a floating-point UI amount
pub fn to_ui_amount(base_units: u64, decimals: u8) -> f64 {
    base_units as f64 / 10f64.powi(decimals as i32)
}

/// Lamports to SOL
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Format base units as an exact decimal string, trailing zeros trimmed
pub fn format_units(value: u64, decimals: u8) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let divisor = 10u128.pow(decimals as u32);
    let whole = value as u128 / divisor;
    let remainder = value as u128 % divisor;

    if remainder == 0 {
        whole.to_string()
    } else {
        let remainder_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = remainder_str.trim_end_matches('0');
        format!("{}.{}", whole, trimmed)
    }
}
