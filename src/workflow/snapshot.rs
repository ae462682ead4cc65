//! Portfolio snapshot produced by a refresh

use crate::chain::{TokenHolding, TransactionRecord, WalletBalances};
use crate::tokens::WRAPPED_SOL_MINT;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;

/// Everything one refresh cycle observed, replaced wholesale on the next one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub owner: String,
    pub lamports: u64,
    pub native_balance: f64,
    pub token_holdings: Vec<TokenHolding>,
    /// USD price per mint; unknown prices are 0.0
    pub prices: HashMap<String, f64>,
    pub transactions: Vec<TransactionRecord>,
    pub total_usd: f64,
    pub refreshed_at: DateTime<Utc>,
}

impl PortfolioSnapshot {
    pub fn assemble(
        owner: &Pubkey,
        balances: WalletBalances,
        native_price_usd: f64,
        token_prices: impl IntoIterator<Item = (Pubkey, f64)>,
        transactions: Vec<TransactionRecord>,
    ) -> Self {
        let mut prices: HashMap<String, f64> = token_prices
            .into_iter()
            .map(|(mint, price)| (mint.to_string(), price))
            .collect();
        prices.insert(WRAPPED_SOL_MINT.to_string(), native_price_usd);

        let tokens_usd: f64 = balances
            .token_holdings
            .iter()
            .map(|h| h.ui_balance * prices.get(&h.mint.to_string()).copied().unwrap_or(0.0))
            .sum();
        let total_usd = balances.native_balance * native_price_usd + tokens_usd;

        Self {
            owner: owner.to_string(),
            lamports: balances.lamports,
            native_balance: balances.native_balance,
            token_holdings: balances.token_holdings,
            prices,
            transactions,
            total_usd,
            refreshed_at: Utc::now(),
        }
    }

    /// Snapshot with no balances, for tests and first display
    pub fn empty(owner: Pubkey) -> Self {
        Self::assemble(
            &owner,
            WalletBalances {
                lamports: 0,
                native_balance: 0.0,
                token_holdings: Vec::new(),
            },
            0.0,
            [],
            Vec::new(),
        )
    }

    pub fn native_price_usd(&self) -> f64 {
        self.price_of(WRAPPED_SOL_MINT)
    }

    pub fn price_of(&self, mint: &str) -> f64 {
        self.prices.get(mint).copied().unwrap_or(0.0)
    }

    /// Holding by token account address
    pub fn holding(&self, token_account: &Pubkey) -> Option<&TokenHolding> {
        self.token_holdings
            .iter()
            .find(|h| h.token_account == *token_account)
    }

    pub fn holding_for_mint(&self, mint: &Pubkey) -> Option<&TokenHolding> {
        self.token_holdings.iter().find(|h| h.mint == *mint)
    }

    /// Holdings with a zero balance, eligible for closing
    pub fn empty_accounts(&self) -> impl Iterator<Item = &TokenHolding> {
        self.token_holdings.iter().filter(|h| h.amount == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_use_native_and_token_prices() {
        let mint = Pubkey::new_unique();
        let unpriced = Pubkey::new_unique();
        let balances = WalletBalances {
            lamports: 2_000_000_000,
            native_balance: 2.0,
            token_holdings: vec![
                TokenHolding {
                    mint,
                    token_account: Pubkey::new_unique(),
                    amount: 3_000_000,
                    decimals: 6,
                    ui_balance: 3.0,
                },
                TokenHolding {
                    mint: unpriced,
                    token_account: Pubkey::new_unique(),
                    amount: 0,
                    decimals: 6,
                    ui_balance: 0.0,
                },
            ],
        };

        let owner = Pubkey::new_unique();
        let snapshot =
            PortfolioSnapshot::assemble(&owner, balances, 100.0, [(mint, 2.0)], Vec::new());
        assert_eq!(snapshot.total_usd, 206.0);
        assert_eq!(snapshot.native_price_usd(), 100.0);
        assert_eq!(snapshot.price_of(&unpriced.to_string()), 0.0);
        assert_eq!(snapshot.empty_accounts().count(), 1);
        assert!(snapshot.holding_for_mint(&mint).is_some());
    }
}
