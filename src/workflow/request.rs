//! Outbound requests and their validation
//!
//! Requests arrive as user-entered text. [`resolve`] turns them into a
//! [`ResolvedAction`] with parsed keys and base-unit amounts, without any
//! network call.

use crate::swap::{QuoteRequest, SwapOrder, MAX_SLIPPAGE_BPS};
use crate::tokens::{registry, TokenAmount, SOL_DECIMALS, WRAPPED_SOL_MINT};
use crate::workflow::snapshot::PortfolioSnapshot;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use uuid::Uuid;

/// A user-initiated action, as entered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundRequest {
    /// Send SOL
    Transfer { destination: String, amount: String },
    /// Send an SPL token
    TokenTransfer {
        destination: String,
        mint: Option<String>,
        amount: String,
        /// Looked up from balances or the token registry when omitted
        decimals: Option<u8>,
    },
    /// Close an empty token account
    CloseAccount { token_account: String },
    Swap {
        input_mint: String,
        output_mint: String,
        amount: String,
        input_decimals: Option<u8>,
        slippage_bps: u16,
        route_via_relay: bool,
    },
}

/// A validated action ready for confirmation
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedAction {
    Transfer {
        destination: Pubkey,
        amount: TokenAmount,
    },
    TokenTransfer {
        destination: Pubkey,
        mint: Pubkey,
        amount: TokenAmount,
    },
    CloseAccount {
        token_account: Pubkey,
        mint: Pubkey,
        fee_destination: Pubkey,
        fee_lamports: u64,
    },
    Swap(SwapOrder),
}

impl ResolvedAction {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolvedAction::Transfer { .. } => "transfer",
            ResolvedAction::TokenTransfer { .. } => "token_transfer",
            ResolvedAction::CloseAccount { .. } => "close_account",
            ResolvedAction::Swap(_) => "swap",
        }
    }

    /// Service fee charged on top of network fees
    pub fn fee_lamports(&self) -> Option<u64> {
        match self {
            ResolvedAction::CloseAccount { fee_lamports, .. } => Some(*fee_lamports),
            _ => None,
        }
    }

    /// JSON description for the audit trail
    pub fn describe(&self) -> Value {
        match self {
            ResolvedAction::Transfer {
                destination,
                amount,
            } => json!({
                "destination": destination.to_string(),
                "lamports": amount.base_units,
            }),
            ResolvedAction::TokenTransfer {
                destination,
                mint,
                amount,
            } => json!({
                "destination": destination.to_string(),
                "mint": mint.to_string(),
                "amount": amount.base_units,
                "decimals": amount.decimals,
            }),
            ResolvedAction::CloseAccount {
                token_account,
                mint,
                fee_destination,
                fee_lamports,
            } => json!({
                "token_account": token_account.to_string(),
                "mint": mint.to_string(),
                "fee_destination": fee_destination.to_string(),
                "fee_lamports": fee_lamports,
            }),
            ResolvedAction::Swap(order) => json!({
                "input_mint": order.quote.input_mint.to_string(),
                "output_mint": order.quote.output_mint.to_string(),
                "amount": order.quote.amount.base_units,
                "slippage_bps": order.quote.slippage_bps,
                "route_via_relay": order.route_via_relay,
            }),
        }
    }
}

impl std::fmt::Display for ResolvedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reg = registry();
        match self {
            ResolvedAction::Transfer {
                destination,
                amount,
            } => write!(f, "Send {} SOL to {}", amount, destination),
            ResolvedAction::TokenTransfer {
                destination,
                mint,
                amount,
            } => write!(
                f,
                "Send {} {} to {}",
                amount,
                reg.symbol_for(&mint.to_string()),
                destination
            ),
            ResolvedAction::CloseAccount {
                token_account,
                fee_lamports,
                ..
            } => write!(
                f,
                "Close token account {} (fee {} SOL)",
                token_account,
                TokenAmount::lamports(*fee_lamports)
            ),
            ResolvedAction::Swap(order) => write!(
                f,
                "Swap {} {} for {} (slippage {} bps{})",
                order.quote.amount,
                reg.symbol_for(&order.quote.input_mint.to_string()),
                reg.symbol_for(&order.quote.output_mint.to_string()),
                order.quote.slippage_bps,
                if order.route_via_relay { ", via relay" } else { "" }
            ),
        }
    }
}

/// An action awaiting the user's decision
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub id: Uuid,
    /// Wallet the action was validated against
    pub owner: Pubkey,
    pub action: ResolvedAction,
    pub created_at: DateTime<Utc>,
}

impl PendingAction {
    pub fn new(owner: Pubkey, action: ResolvedAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            action,
            created_at: Utc::now(),
        }
    }
}

/// What validation may consult
pub struct ValidationContext<'a> {
    pub snapshot: Option<&'a PortfolioSnapshot>,
    pub fee_destination: Pubkey,
    pub fee_lamports: u64,
}

fn parse_destination(input: &str) -> Result<Pubkey> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("Destination address is required".to_string()));
    }
    Pubkey::from_str(trimmed)
        .map_err(|_| Error::Validation(format!("Invalid destination address: {}", trimmed)))
}

fn parse_positive(amount: &str, decimals: u8) -> Result<TokenAmount> {
    let parsed = TokenAmount::parse(amount, decimals)?;
    if parsed.is_zero() {
        return Err(Error::Validation("Amount must be greater than zero".to_string()));
    }
    Ok(parsed)
}

fn required_mint(mint: Option<&str>) -> Result<Pubkey> {
    match mint.map(str::trim).filter(|m| !m.is_empty()) {
        Some(mint) => registry().resolve_mint(mint),
        None => Err(Error::Validation("Select a token".to_string())),
    }
}

/// Decimals of `mint`: explicit, then native, then held balances, then registry
fn decimals_for(mint: &Pubkey, explicit: Option<u8>, ctx: &ValidationContext<'_>) -> Result<u8> {
    if let Some(decimals) = explicit {
        return Ok(decimals);
    }
    let mint_str = mint.to_string();
    if mint_str == WRAPPED_SOL_MINT {
        return Ok(SOL_DECIMALS);
    }
    if let Some(holding) = ctx.snapshot.and_then(|s| s.holding_for_mint(mint)) {
        return Ok(holding.decimals);
    }
    registry()
        .get(&mint_str)
        .map(|info| info.decimals)
        .ok_or_else(|| Error::Validation(format!("Unknown decimals for mint {}", mint_str)))
}

/// Validate a request without touching the network
pub fn resolve(request: &OutboundRequest, ctx: &ValidationContext<'_>) -> Result<ResolvedAction> {
    match request {
        OutboundRequest::Transfer {
            destination,
            amount,
        } => Ok(ResolvedAction::Transfer {
            destination: parse_destination(destination)?,
            amount: parse_positive(amount, SOL_DECIMALS)?,
        }),

        OutboundRequest::TokenTransfer {
            destination,
            mint,
            amount,
            decimals,
        } => {
            let destination = parse_destination(destination)?;
            let mint = required_mint(mint.as_deref())?;
            let decimals = decimals_for(&mint, *decimals, ctx)?;
            Ok(ResolvedAction::TokenTransfer {
                destination,
                mint,
                amount: parse_positive(amount, decimals)?,
            })
        }

        OutboundRequest::CloseAccount { token_account } => {
            let token_account = Pubkey::from_str(token_account.trim()).map_err(|_| {
                Error::Validation(format!("Invalid token account: {}", token_account))
            })?;
            let snapshot = ctx.snapshot.ok_or_else(|| {
                Error::Validation("Balances not loaded; refresh before closing accounts".to_string())
            })?;
            let holding = snapshot.holding(&token_account).ok_or_else(|| {
                Error::Validation(format!("Unknown token account: {}", token_account))
            })?;
            if holding.amount != 0 {
                return Err(Error::Validation(
                    "Token account still holds a balance".to_string(),
                ));
            }
            Ok(ResolvedAction::CloseAccount {
                token_account,
                mint: holding.mint,
                fee_destination: ctx.fee_destination,
                fee_lamports: ctx.fee_lamports,
            })
        }

        OutboundRequest::Swap {
            input_mint,
            output_mint,
            amount,
            input_decimals,
            slippage_bps,
            route_via_relay,
        } => {
            let input = required_mint(Some(input_mint))?;
            let output = required_mint(Some(output_mint))?;
            if input == output {
                return Err(Error::Validation(
                    "Input and output tokens must differ".to_string(),
                ));
            }
            if *slippage_bps > MAX_SLIPPAGE_BPS {
                return Err(Error::Validation(format!(
                    "Slippage must be at most {} bps",
                    MAX_SLIPPAGE_BPS
                )));
            }
            let decimals = decimals_for(&input, *input_decimals, ctx)?;
            Ok(ResolvedAction::Swap(SwapOrder {
                quote: QuoteRequest {
                    input_mint: input,
                    output_mint: output,
                    amount: parse_positive(amount, decimals)?,
                    slippage_bps: *slippage_bps,
                },
                route_via_relay: *route_via_relay,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::types::TokenHolding;
    use crate::tokens::mints;

    fn ctx(snapshot: Option<&PortfolioSnapshot>) -> ValidationContext<'_> {
        ValidationContext {
            snapshot,
            fee_destination: Pubkey::new_unique(),
            fee_lamports: 50_000,
        }
    }

    fn snapshot_with(holding: TokenHolding) -> PortfolioSnapshot {
        let mut snapshot = PortfolioSnapshot::empty(Pubkey::new_unique());
        snapshot.token_holdings.push(holding);
        snapshot
    }

    fn holding(amount: u64) -> TokenHolding {
        TokenHolding {
            mint: Pubkey::new_unique(),
            token_account: Pubkey::new_unique(),
            amount,
            decimals: 4,
            ui_balance: crate::tokens::to_ui_amount(amount, 4),
        }
    }

    fn transfer(destination: &str, amount: &str) -> OutboundRequest {
        OutboundRequest::Transfer {
            destination: destination.to_string(),
            amount: amount.to_string(),
        }
    }

    #[test]
    fn transfer_resolves_to_lamports() {
        let dest = Pubkey::new_unique();
        let action = resolve(&transfer(&dest.to_string(), "0.5"), &ctx(None)).unwrap();
        assert_eq!(
            action,
            ResolvedAction::Transfer {
                destination: dest,
                amount: TokenAmount::lamports(500_000_000),
            }
        );
        assert_eq!(action.to_string(), format!("Send 0.5 SOL to {}", dest));
    }

    #[test]
    fn transfer_rejections() {
        let dest = Pubkey::new_unique().to_string();
        for request in [
            transfer("", "1"),
            transfer("   ", "1"),
            transfer("not-a-key", "1"),
            transfer(&dest, "abc"),
            transfer(&dest, "0"),
            transfer(&dest, "-1"),
            transfer(&dest, ""),
        ] {
            assert!(
                matches!(resolve(&request, &ctx(None)), Err(Error::Validation(_))),
                "accepted {:?}",
                request
            );
        }
    }

    #[test]
    fn token_transfer_requires_token() {
        let request = OutboundRequest::TokenTransfer {
            destination: Pubkey::new_unique().to_string(),
            mint: None,
            amount: "1".to_string(),
            decimals: None,
        };
        assert!(matches!(resolve(&request, &ctx(None)), Err(Error::Validation(_))));
    }

    #[test]
    fn token_transfer_takes_decimals_from_holdings() {
        let held = holding(10_000);
        let snapshot = snapshot_with(held.clone());
        let request = OutboundRequest::TokenTransfer {
            destination: Pubkey::new_unique().to_string(),
            mint: Some(held.mint.to_string()),
            amount: "0.25".to_string(),
            decimals: None,
        };
        match resolve(&request, &ctx(Some(&snapshot))).unwrap() {
            ResolvedAction::TokenTransfer { amount, .. } => {
                assert_eq!(amount, TokenAmount::from_base_units(2_500, 4))
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn token_transfer_resolves_registry_symbol() {
        let request = OutboundRequest::TokenTransfer {
            destination: Pubkey::new_unique().to_string(),
            mint: Some("usdc".to_string()),
            amount: "2".to_string(),
            decimals: None,
        };
        match resolve(&request, &ctx(None)).unwrap() {
            ResolvedAction::TokenTransfer { mint, amount, .. } => {
                assert_eq!(mint.to_string(), mints::USDC);
                assert_eq!(amount.base_units, 2_000_000);
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn close_account_only_for_known_empty_accounts() {
        let empty = holding(0);
        let funded = holding(1);
        let mut snapshot = snapshot_with(empty.clone());
        snapshot.token_holdings.push(funded.clone());

        let close = |account: &Pubkey| OutboundRequest::CloseAccount {
            token_account: account.to_string(),
        };

        let action = resolve(&close(&empty.token_account), &ctx(Some(&snapshot))).unwrap();
        assert_eq!(action.fee_lamports(), Some(50_000));

        for request in [
            close(&funded.token_account),
            close(&Pubkey::new_unique()),
        ] {
            assert!(matches!(
                resolve(&request, &ctx(Some(&snapshot))),
                Err(Error::Validation(_))
            ));
        }
        assert!(resolve(&close(&empty.token_account), &ctx(None)).is_err());
    }

    #[test]
    fn swap_validation() {
        let swap = |input: &str, output: &str, slippage: u16| OutboundRequest::Swap {
            input_mint: input.to_string(),
            output_mint: output.to_string(),
            amount: "1.5".to_string(),
            input_decimals: None,
            slippage_bps: slippage,
            route_via_relay: false,
        };

        match resolve(&swap("SOL", "USDC", 50), &ctx(None)).unwrap() {
            ResolvedAction::Swap(order) => {
                assert_eq!(order.quote.amount.base_units, 1_500_000_000);
                assert_eq!(order.quote.output_mint.to_string(), mints::USDC);
            }
            other => panic!("unexpected action: {:?}", other),
        }

        assert!(resolve(&swap("USDC", "USDC", 50), &ctx(None)).is_err());
        assert!(resolve(&swap("SOL", "USDC", 10_001), &ctx(None)).is_err());
        assert!(resolve(&swap("SOL", "", 50), &ctx(None)).is_err());
        let unknown = Pubkey::new_unique().to_string();
        assert!(resolve(&swap(&unknown, "USDC", 50), &ctx(None)).is_err());
    }

    #[test]
    fn request_json_is_tagged() {
        let request: OutboundRequest = serde_json::from_value(json!({
            "kind": "close_account",
            "token_account": "abc"
        }))
        .unwrap();
        assert_eq!(
            request,
            OutboundRequest::CloseAccount {
                token_account: "abc".to_string()
            }
        );
    }
}
