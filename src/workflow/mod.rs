//! Transaction workflow
//!
//! Every user-initiated action moves through
//! `Idle -> AwaitingConfirmation -> Submitting -> Settled`. Validation runs
//! inside `begin` and never touches the network. Nothing is submitted until
//! `confirm` is called with the id of the pending action.
//!
//! The workflow also owns the portfolio refresh and its cooldown.

pub mod cooldown;
pub mod request;
pub mod snapshot;

pub use cooldown::RefreshCooldown;
pub use request::{OutboundRequest, PendingAction, ResolvedAction, ValidationContext};
pub use snapshot::PortfolioSnapshot;

use crate::audit::AuditLog;
use crate::chain::ChainGateway;
use crate::config::Config;
use crate::prices::PriceFeed;
use crate::swap::SwapGateway;
use crate::tokens::WRAPPED_SOL_MINT;
use crate::wallet::{SecureWallet, Session};
use crate::{Error, Result};
use futures::future::join_all;
use solana_sdk::pubkey::Pubkey;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// How a settled action ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { signature: String },
    /// Only a short category and a generic message cross this boundary
    Failure {
        category: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub action_id: Uuid,
    pub kind: &'static str,
    pub outcome: Outcome,
}

impl Settlement {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    /// The signature of a successful action, or the failure as an error
    pub fn into_result(self) -> Result<String> {
        match self.outcome {
            Outcome::Success { signature } => Ok(signature),
            Outcome::Failure { category, message } => {
                Err(Error::ActionFailed { category, message })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    AwaitingConfirmation(PendingAction),
    Submitting(PendingAction),
    Settled(Settlement),
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::AwaitingConfirmation(_) => "awaiting_confirmation",
            WorkflowState::Submitting(_) => "submitting",
            WorkflowState::Settled(_) => "settled",
        }
    }
}

/// User-facing text for a failure category
fn generic_message(error: &Error) -> &'static str {
    match error {
        Error::Validation(_) => "The request was invalid.",
        Error::ChainRequest(_) => "The network request failed. Please try again.",
        Error::QuoteUnavailable(_) => "No swap quote is available right now.",
        Error::SwapBuildFailed(_) => "The swap could not be prepared.",
        Error::RelaySubmitFailed(_) => "The transaction relay did not accept the swap.",
        Error::NoActiveWallet => "No wallet is loaded.",
        _ => "The action failed.",
    }
}

pub struct TransactionWorkflow {
    session: Arc<Session>,
    chain: Arc<ChainGateway>,
    swaps: Arc<SwapGateway>,
    prices: Arc<dyn PriceFeed>,
    fee_destination: Pubkey,
    fee_lamports: u64,
    history_limit: usize,
    cooldown: RefreshCooldown,
    audit: Option<AuditLog>,
    state: Mutex<WorkflowState>,
    snapshot: Mutex<Option<Arc<PortfolioSnapshot>>>,
}

impl TransactionWorkflow {
    pub fn new(
        session: Arc<Session>,
        chain: Arc<ChainGateway>,
        swaps: Arc<SwapGateway>,
        prices: Arc<dyn PriceFeed>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            session,
            chain,
            swaps,
            prices,
            fee_destination: config.fees.fee_wallet_pubkey()?,
            fee_lamports: config.fees.close_account_fee_lamports,
            history_limit: config.workflow.history_limit,
            cooldown: RefreshCooldown::from_secs(config.workflow.refresh_cooldown_secs),
            audit: None,
            state: Mutex::new(WorkflowState::Idle),
            snapshot: Mutex::new(None),
        })
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    // The guarded data is plain state with no invariants spanning a panic
    fn lock_state(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> WorkflowState {
        self.lock_state().clone()
    }

    /// Latest successful refresh, if any
    pub fn snapshot(&self) -> Option<Arc<PortfolioSnapshot>> {
        self.snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Validate a request and hold it for confirmation
    pub async fn begin(&self, request: OutboundRequest) -> Result<PendingAction> {
        let wallet = self.session.require().await?;
        let snapshot = self.snapshot();

        let mut state = self.lock_state();
        if matches!(
            *state,
            WorkflowState::AwaitingConfirmation(_) | WorkflowState::Submitting(_)
        ) {
            return Err(Error::Busy);
        }

        let ctx = ValidationContext {
            snapshot: snapshot.as_deref(),
            fee_destination: self.fee_destination,
            fee_lamports: self.fee_lamports,
        };
        match request::resolve(&request, &ctx) {
            Ok(action) => {
                let pending = PendingAction::new(wallet.pubkey(), action);
                tracing::info!(
                    action_id = %pending.id,
                    kind = pending.action.kind(),
                    "Action awaiting confirmation"
                );
                *state = WorkflowState::AwaitingConfirmation(pending.clone());
                Ok(pending)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Request rejected by validation");
                *state = WorkflowState::Idle;
                Err(e)
            }
        }
    }

    /// Drop the pending action without side effects
    pub fn cancel(&self) -> Result<()> {
        let mut state = self.lock_state();
        match &*state {
            WorkflowState::AwaitingConfirmation(pending) => {
                tracing::info!(action_id = %pending.id, "Action cancelled");
                *state = WorkflowState::Idle;
                Ok(())
            }
            other => Err(Error::InvalidState(format!(
                "nothing to cancel in state {}",
                other.name()
            ))),
        }
    }

    /// Submit the pending action
    ///
    /// Returns the settlement; a failed submission is reported inside it,
    /// not as an `Err`.
    pub async fn confirm(&self, action_id: Uuid) -> Result<Settlement> {
        let pending = {
            let mut state = self.lock_state();
            match &*state {
                WorkflowState::AwaitingConfirmation(pending) if pending.id == action_id => {
                    let pending = pending.clone();
                    *state = WorkflowState::Submitting(pending.clone());
                    pending
                }
                WorkflowState::AwaitingConfirmation(_) => {
                    return Err(Error::InvalidState(
                        "action id does not match the pending action".to_string(),
                    ))
                }
                WorkflowState::Submitting(_) => return Err(Error::Busy),
                other => {
                    return Err(Error::InvalidState(format!(
                        "no action awaiting confirmation in state {}",
                        other.name()
                    )))
                }
            }
        };

        tracing::info!(action_id = %pending.id, kind = pending.action.kind(), "Submitting action");
        let result = match self.session.require().await {
            Ok(wallet) if wallet.pubkey() == pending.owner => {
                self.dispatch(&wallet, &pending.action).await
            }
            Ok(_) => Err(Error::InvalidState(
                "active wallet changed since the action was prepared".to_string(),
            )),
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(signature) => {
                tracing::info!(action_id = %pending.id, signature = %signature, "Action succeeded");
                Outcome::Success { signature }
            }
            Err(e) => {
                tracing::warn!(
                    action_id = %pending.id,
                    category = e.category(),
                    error = %e,
                    "Action failed"
                );
                Outcome::Failure {
                    category: e.category(),
                    message: generic_message(&e).to_string(),
                }
            }
        };

        if let Some(audit) = &self.audit {
            audit.record(&pending, &outcome).await;
        }

        let settlement = Settlement {
            action_id: pending.id,
            kind: pending.action.kind(),
            outcome,
        };
        *self.lock_state() = WorkflowState::Settled(settlement.clone());

        if settlement.is_success() {
            if let Err(e) = self.refresh(true).await {
                tracing::warn!(error = %e, "Refresh after submission failed");
            }
        }

        Ok(settlement)
    }

    async fn dispatch(&self, wallet: &SecureWallet, action: &ResolvedAction) -> Result<String> {
        match action {
            ResolvedAction::Transfer {
                destination,
                amount,
            } => self.chain.transfer_native(wallet, destination, *amount).await,
            ResolvedAction::TokenTransfer {
                destination,
                mint,
                amount,
            } => {
                self.chain
                    .transfer_token(wallet, destination, mint, *amount)
                    .await
            }
            ResolvedAction::CloseAccount {
                token_account,
                fee_destination,
                fee_lamports,
                ..
            } => {
                self.chain
                    .close_empty_token_account(wallet, token_account, fee_destination, *fee_lamports)
                    .await
            }
            ResolvedAction::Swap(order) => self
                .swaps
                .execute(wallet, order)
                .await
                .map(|outcome| outcome.signature),
        }
    }

    /// Return a settled workflow to idle
    pub fn reset(&self) -> Result<()> {
        let mut state = self.lock_state();
        match &*state {
            WorkflowState::Settled(_) | WorkflowState::Idle => {
                *state = WorkflowState::Idle;
                Ok(())
            }
            other => Err(Error::InvalidState(format!(
                "cannot reset in state {}",
                other.name()
            ))),
        }
    }

    /// Reload balances, prices and history
    ///
    /// Unforced refreshes inside the cooldown window fail with
    /// `RefreshThrottled` before any network call. The window is claimed up
    /// front and handed back if the refresh fails, which also keeps the
    /// previous snapshot.
    pub async fn refresh(&self, force: bool) -> Result<Arc<PortfolioSnapshot>> {
        let wallet = self.session.require().await?;
        let lease = if force {
            self.cooldown.arm().await
        } else {
            match self.cooldown.try_arm().await {
                Ok(lease) => lease,
                Err(remaining) => {
                    let remaining_secs = cooldown::ceil_secs(remaining);
                    tracing::debug!(remaining_secs, "Refresh throttled");
                    return Err(Error::RefreshThrottled { remaining_secs });
                }
            }
        };

        let owner = wallet.pubkey();
        let snapshot = match self.load_snapshot(&owner).await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                self.cooldown.release(lease).await;
                return Err(e);
            }
        };
        *self.snapshot.lock().unwrap_or_else(|e| e.into_inner()) = Some(snapshot.clone());

        tracing::info!(
            owner = %owner,
            native_balance = snapshot.native_balance,
            token_accounts = snapshot.token_holdings.len(),
            transactions = snapshot.transactions.len(),
            total_usd = snapshot.total_usd,
            "Portfolio refreshed"
        );
        Ok(snapshot)
    }

    async fn load_snapshot(&self, owner: &Pubkey) -> Result<PortfolioSnapshot> {
        let (balances, transactions, native_price) = tokio::try_join!(
            self.chain.get_balances(owner),
            self.chain.get_recent_transactions(owner, self.history_limit),
            self.native_price_or_zero(),
        )?;

        let mints: BTreeSet<Pubkey> = balances
            .token_holdings
            .iter()
            .map(|h| h.mint)
            .filter(|mint| mint.to_string() != WRAPPED_SOL_MINT)
            .collect();
        let token_prices = join_all(mints.into_iter().map(|mint| async move {
            let price = match self.prices.token_price_usd(&mint).await {
                Ok(price) => price.unwrap_or(0.0),
                Err(e) => {
                    tracing::warn!(mint = %mint, error = %e, "Token price unavailable");
                    0.0
                }
            };
            (mint, price)
        }))
        .await;

        Ok(PortfolioSnapshot::assemble(
            owner,
            balances,
            native_price,
            token_prices,
            transactions,
        ))
    }

    async fn native_price_or_zero(&self) -> Result<f64> {
        match self.prices.native_asset_price_usd().await {
            Ok(price) => Ok(price),
            Err(e) => {
                tracing::warn!(error = %e, "SOL price unavailable");
                Ok(0.0)
            }
        }
    }
}
