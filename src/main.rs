//! Solana wallet CLI
//!
//! Command-line front end for key import, balances, transfers and swaps.

use clap::{Parser, Subcommand};
use eatsol_wallet::bridge::{review_page_message, BridgeVerdict};
use eatsol_wallet::chain::{ChainGateway, ChainRpc, HttpRpcClient};
use eatsol_wallet::config::KEYSTORE_PASSPHRASE_ENV;
use eatsol_wallet::prices::{HttpPriceFeed, PriceFeed};
use eatsol_wallet::swap::{HeliusRelay, JupiterClient, SwapGateway};
use eatsol_wallet::tokens::{format_units, registry, TokenAmount, SOL_DECIMALS, WRAPPED_SOL_MINT};
use eatsol_wallet::wallet::{parse_secret_key_input, EncryptedFileStore, KeyStore, DERIVATION_PATH};
use eatsol_wallet::workflow::{OutboundRequest, PendingAction};
use eatsol_wallet::{
    audit::AuditLog, Commitment, Config, Error, Result, Secrets, Session, TransactionWorkflow,
};
use secrecy::ExposeSecret;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "eatsol")]
#[command(about = "Self-custodial Solana wallet")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Skip the confirmation prompt
    #[arg(short, long, global = true)]
    yes: bool,

    /// Override the configured commitment level
    #[arg(long, global = true)]
    commitment: Option<Commitment>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a wallet from a seed phrase, read from EATSOL_IMPORT_SECRET or stdin
    ImportMnemonic,

    /// Import a wallet from a secret key (JSON byte array or base58), read
    /// from EATSOL_IMPORT_SECRET or stdin
    ImportKey,

    /// Erase the stored wallet
    Remove,

    /// Print the wallet address
    Address,

    /// Show balances and USD values
    Balances,

    /// Show recent confirmed transactions
    History,

    /// Send SOL, or an SPL token with --mint
    Send {
        /// Destination address
        #[arg(long)]
        to: String,

        /// Amount in whole units (e.g. 0.5)
        #[arg(long)]
        amount: String,

        /// Token symbol or mint address
        #[arg(long)]
        mint: Option<String>,

        /// Token decimals, if the token is not held or known
        #[arg(long)]
        decimals: Option<u8>,
    },

    /// Close an empty token account
    CloseAccount {
        /// Token account address
        account: String,
    },

    /// Swap tokens through the aggregator
    Swap {
        /// Input token symbol or mint
        #[arg(long)]
        from: String,

        /// Output token symbol or mint
        #[arg(long)]
        to: String,

        /// Input amount in whole units
        #[arg(long)]
        amount: String,

        /// Slippage tolerance in basis points
        #[arg(long, default_value_t = 50)]
        slippage_bps: u16,

        /// Input token decimals, if the token is not held or known
        #[arg(long)]
        decimals: Option<u8>,

        /// Submit through the transaction relay instead of RPC
        #[arg(long)]
        relay: bool,
    },

    /// Get a swap quote without a wallet
    Quote {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        #[arg(long)]
        amount: String,

        #[arg(long, default_value_t = 50)]
        slippage_bps: u16,

        #[arg(long)]
        decimals: Option<u8>,
    },

    /// Show current configuration
    Config,

    /// Classify a message posted by a web page
    BridgeReview {
        /// Raw JSON message
        message: String,
    },
}

struct Gateways {
    chain: Arc<ChainGateway>,
    swaps: Arc<SwapGateway>,
    prices: Arc<dyn PriceFeed>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    // Load config
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };
    if let Some(commitment) = cli.commitment {
        config.rpc.commitment = commitment;
    }
    let mut secrets = Secrets::from_env();

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::BridgeReview { message } => match review_page_message(&message) {
            BridgeVerdict::Rejected { reason } => println!("Rejected: {}", reason),
            BridgeVerdict::RequiresManualApproval {
                origin, summary, ..
            } => {
                println!(
                    "Manual approval required: {} (origin: {})",
                    summary,
                    origin.as_deref().unwrap_or("unknown")
                );
                println!("Automatic approval is not supported.");
            }
        },
        Commands::Quote {
            from,
            to,
            amount,
            slippage_bps,
            decimals,
        } => {
            let gateways = build_gateways(&config, &mut secrets);
            run_quote(&gateways, &from, &to, &amount, slippage_bps, decimals).await?;
        }
        Commands::ImportMnemonic => {
            let session = open_session(&config, &mut secrets, false).await?;
            let phrase = import_secret(&mut secrets, "Seed phrase: ")?;
            let pubkey = session.import_from_mnemonic(&phrase).await?;
            println!("Imported {} (derived at {})", pubkey, DERIVATION_PATH);
        }
        Commands::ImportKey => {
            let session = open_session(&config, &mut secrets, false).await?;
            let input = import_secret(&mut secrets, "Secret key: ")?;
            let bytes = parse_secret_key_input(&input)?;
            let pubkey = session.import_from_secret_key_bytes(&bytes).await?;
            println!("Imported {}", pubkey);
        }
        Commands::Remove => {
            let session = open_session(&config, &mut secrets, false).await?;
            if !cli.yes && !prompt_yes("Erase the stored wallet?")? {
                println!("Cancelled");
                return Ok(());
            }
            session.remove().await?;
            println!("Wallet removed");
        }
        Commands::Address => {
            let session = open_session(&config, &mut secrets, true).await?;
            if !session.is_loaded().await {
                return Err(Error::NoActiveWallet);
            }
            println!("{}", session.require().await?.pubkey());
        }
        Commands::Balances => {
            let workflow = open_workflow(&config, &mut secrets).await?;
            print_balances(&workflow)?;
        }
        Commands::History => {
            let workflow = open_workflow(&config, &mut secrets).await?;
            print_history(&workflow)?;
        }
        Commands::Send {
            to,
            amount,
            mint,
            decimals,
        } => {
            let request = match mint {
                Some(mint) => OutboundRequest::TokenTransfer {
                    destination: to,
                    mint: Some(mint),
                    amount,
                    decimals,
                },
                None => OutboundRequest::Transfer {
                    destination: to,
                    amount,
                },
            };
            let workflow = open_workflow(&config, &mut secrets).await?;
            run_action(&workflow, request, cli.yes).await?;
        }
        Commands::CloseAccount { account } => {
            let workflow = open_workflow(&config, &mut secrets).await?;
            let request = OutboundRequest::CloseAccount {
                token_account: account,
            };
            run_action(&workflow, request, cli.yes).await?;
        }
        Commands::Swap {
            from,
            to,
            amount,
            slippage_bps,
            decimals,
            relay,
        } => {
            let workflow = open_workflow(&config, &mut secrets).await?;
            let request = OutboundRequest::Swap {
                input_mint: from,
                output_mint: to,
                amount,
                input_decimals: decimals,
                slippage_bps,
                route_via_relay: relay,
            };
            run_action(&workflow, request, cli.yes).await?;
        }
    }

    Ok(())
}

fn build_gateways(config: &Config, secrets: &mut Secrets) -> Gateways {
    let rpc: Arc<dyn ChainRpc> = Arc::new(HttpRpcClient::from_config(&config.rpc));
    let chain = Arc::new(ChainGateway::new(rpc, &config.rpc));

    let mut swaps = SwapGateway::new(Arc::new(JupiterClient::new(&config.jupiter)), chain.clone());
    if let Some(key) = secrets.relay_api_key.take() {
        swaps = swaps.with_relay(Arc::new(HeliusRelay::new(&config.relay, key)));
    } else {
        tracing::debug!("No relay API key set, relay submission disabled");
    }

    let prices: Arc<dyn PriceFeed> = Arc::new(HttpPriceFeed::new(
        &config.prices,
        secrets.birdeye_api_key.take(),
    ));

    Gateways {
        chain,
        swaps: Arc::new(swaps),
        prices,
    }
}

async fn open_session(
    config: &Config,
    secrets: &mut Secrets,
    restore: bool,
) -> Result<Arc<Session>> {
    let passphrase = secrets
        .keystore_passphrase
        .take()
        .ok_or_else(|| Error::Config(format!("{} is not set", KEYSTORE_PASSPHRASE_ENV)))?;
    let store =
        EncryptedFileStore::new(&config.keystore.dir, passphrase)?.with_kdf_params(config.keystore.kdf);

    let session = Arc::new(Session::new(KeyStore::new(store)));
    if restore {
        session.restore().await?;
    }
    Ok(session)
}

async fn open_workflow(config: &Config, secrets: &mut Secrets) -> Result<TransactionWorkflow> {
    let session = open_session(config, secrets, true).await?;
    let gateways = build_gateways(config, secrets);

    let mut workflow = TransactionWorkflow::new(
        session,
        gateways.chain,
        gateways.swaps,
        gateways.prices,
        config,
    )?;
    if let Some(path) = &config.audit_log_path {
        workflow = workflow.with_audit_log(AuditLog::new(path));
    }

    // Initial load is always forced
    workflow.refresh(true).await?;
    Ok(workflow)
}

async fn run_action(workflow: &TransactionWorkflow, request: OutboundRequest, yes: bool) -> Result<()> {
    let pending = workflow.begin(request).await?;
    print_pending(&pending);

    if !yes && !prompt_yes("Proceed?")? {
        workflow.cancel()?;
        println!("Cancelled");
        return Ok(());
    }

    let signature = workflow.confirm(pending.id).await?.into_result()?;
    println!("Confirmed: {}", signature);
    Ok(())
}

fn print_pending(pending: &PendingAction) {
    println!("{}", pending.action);
    if let Some(fee) = pending.action.fee_lamports() {
        println!("  Service fee: {} SOL", format_units(fee, SOL_DECIMALS));
    }
    println!("  Action id: {}", pending.id);
}

fn print_balances(workflow: &TransactionWorkflow) -> Result<()> {
    let snapshot = workflow
        .snapshot()
        .ok_or_else(|| Error::InvalidState("no balances loaded".to_string()))?;
    let reg = registry();

    println!("Address: {}", snapshot.owner);
    println!(
        "SOL: {} (${:.2})",
        format_units(snapshot.lamports, SOL_DECIMALS),
        snapshot.native_balance * snapshot.native_price_usd()
    );
    if snapshot.token_holdings.is_empty() {
        println!("No token accounts");
    } else {
        println!("Tokens:");
        for holding in &snapshot.token_holdings {
            let mint = holding.mint.to_string();
            let value = holding.ui_balance * snapshot.price_of(&mint);
            println!(
                "  {:<6} {:>20} (${:.2})  account {}",
                reg.symbol_for(&mint),
                format_units(holding.amount, holding.decimals),
                value,
                holding.token_account
            );
        }
    }
    let closable = snapshot.empty_accounts().count();
    if closable > 0 {
        println!(
            "{} empty token account(s) can be closed with `close-account` to reclaim rent",
            closable
        );
    }
    println!("Total: ${:.2}", snapshot.total_usd);
    Ok(())
}

fn print_history(workflow: &TransactionWorkflow) -> Result<()> {
    let snapshot = workflow
        .snapshot()
        .ok_or_else(|| Error::InvalidState("no history loaded".to_string()))?;

    if snapshot.transactions.is_empty() {
        println!("No recent transactions");
        return Ok(());
    }
    for record in &snapshot.transactions {
        let when = record
            .block_time
            .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown time".to_string());
        println!(
            "{}  slot {:>10}  {:<6}  fee {:>7}  {}",
            when,
            record.slot,
            if record.failed() { "failed" } else { "ok" },
            record.fee_lamports().unwrap_or(0),
            record.signature
        );
    }
    Ok(())
}

async fn run_quote(
    gateways: &Gateways,
    from: &str,
    to: &str,
    amount: &str,
    slippage_bps: u16,
    decimals: Option<u8>,
) -> Result<()> {
    let reg = registry();
    let input = reg.resolve_mint(from)?;
    let output = reg.resolve_mint(to)?;

    let input_decimals = decimals
        .or_else(|| reg.get(&input.to_string()).map(|info| info.decimals))
        .ok_or_else(|| {
            Error::Validation(format!("Unknown decimals for {}; pass --decimals", from))
        })?;
    let amount = TokenAmount::parse(amount, input_decimals)?;

    let quote = gateways
        .swaps
        .get_quote(&input, &output, amount, slippage_bps)
        .await?;
    let out_amount = quote.out_amount()?;
    let output_str = output.to_string();
    let out_display = match reg.get(&output_str) {
        Some(info) => format_units(out_amount, info.decimals),
        None => format!("{} base units", out_amount),
    };

    println!(
        "{} {} -> {} {}",
        amount,
        reg.symbol_for(&input.to_string()),
        out_display,
        reg.symbol_for(&output_str)
    );
    if let Some(impact) = &quote.summary.price_impact_pct {
        println!("  Price impact: {}%", impact);
    }
    println!("  Slippage: {} bps", quote.summary.slippage_bps);
    if output_str == WRAPPED_SOL_MINT {
        println!("  Output is unwrapped to native SOL on swap");
    }
    Ok(())
}

fn read_line() -> Result<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| Error::Validation(format!("Failed to read input: {}", e)))?;
    Ok(line)
}

/// Import input from the environment, else from stdin; never from argv
fn import_secret(secrets: &mut Secrets, prompt: &str) -> Result<Zeroizing<String>> {
    match secrets.import_secret.take() {
        Some(secret) => Ok(Zeroizing::new(secret.expose_secret().to_string())),
        None => read_secret_line(prompt),
    }
}

fn read_secret_line(prompt: &str) -> Result<Zeroizing<String>> {
    eprint!("{}", prompt);
    std::io::stderr().flush().ok();
    read_line()
}

fn prompt_yes(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush().ok();
    let answer = read_line()?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
