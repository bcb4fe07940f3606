//! dLEND Flash Liquidation Bot
//!
//! Batch liquidation runner for the dLEND lending market. Given a list of
//! borrower addresses, evaluates each position's health factor and expected
//! liquidation profit, then executes profitable liquidations atomically
//! through a flash-mint- or flash-loan-funded liquidator contract, routing
//! seized collateral through the Odos aggregator.
//!
//! Exit code is non-zero only on configuration-level failure; individual
//! liquidation failures are logged per borrower and never kill the run.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dlend_api::OdosClient;
use dlend_chain::{
    ChainClient, FundingMode, LendingPool, LiquidatorContract, TokenMetadataResolver,
    TransactionSender,
};
use dlend_core::{
    run_bot_batch, BatchSummary, BotConfig, Evaluator, ExecutionAdapter,
};

/// Environment variable names.
mod env {
    /// Path to the bot TOML config (overridden by `--config`).
    pub const BOT_CONFIG: &str = "DLEND_BOT_CONFIG";
    /// Operator private key.
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dlend_core=debug,dlend_chain=debug")),
        )
        .init();

    let args = parse_args()?;

    // Configuration failures are the only fatal class: they abort here,
    // before any batch work starts.
    let config = match &args.config_path {
        Some(path) => BotConfig::from_file(path)?,
        None => {
            if std::env::var(env::BOT_CONFIG).is_err() {
                bail!("no config: pass --config <path> or set {}", env::BOT_CONFIG);
            }
            BotConfig::from_env()?
        }
    };
    config.log_config();

    let borrowers = args.borrowers()?;
    if borrowers.is_empty() {
        bail!("no borrower addresses given (arguments or --borrowers-file)");
    }
    info!(count = borrowers.len(), "Borrower candidates loaded");

    // Chain context; the resolved chain id must match the configured one.
    let chain = Arc::new(ChainClient::connect(&config.rpc_url).await?);
    if chain.chain_id() != config.chain_id {
        bail!(
            "configured chain id {} but rpc endpoint reports {}",
            config.chain_id,
            chain.chain_id()
        );
    }

    let private_key = std::env::var(env::PRIVATE_KEY)
        .with_context(|| format!("missing env var: {}", env::PRIVATE_KEY))?;

    let (evaluator, adapter) = initialize_components(&config, chain, &private_key).await?;

    let started_at = chrono::Utc::now();
    let results = run_bot_batch(
        &evaluator,
        &adapter,
        &borrowers,
        config.batch.health_factor_batch_size,
    )
    .await;

    let summary = BatchSummary::from_results(&results, started_at, chrono::Utc::now());
    summary.log();

    Ok(())
}

/// Parsed command line.
struct Args {
    config_path: Option<String>,
    borrowers_file: Option<String>,
    borrower_args: Vec<String>,
}

impl Args {
    /// Resolve the borrower address list from file and/or arguments,
    /// preserving order.
    fn borrowers(&self) -> Result<Vec<alloy::primitives::Address>> {
        let mut raw: Vec<String> = Vec::new();

        if let Some(path) = &self.borrowers_file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read borrowers file '{path}'"))?;
            raw.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(String::from),
            );
        }
        raw.extend(self.borrower_args.iter().cloned());

        raw.iter()
            .map(|s| {
                s.parse()
                    .map_err(|e| anyhow::anyhow!("invalid borrower address '{s}': {e}"))
            })
            .collect()
    }
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config_path: None,
        borrowers_file: None,
        borrower_args: Vec::new(),
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                args.config_path = Some(iter.next().context("--config requires a path")?)
            }
            "--borrowers-file" => {
                args.borrowers_file =
                    Some(iter.next().context("--borrowers-file requires a path")?)
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("unknown flag: {other}"),
            other => args.borrower_args.push(other.to_string()),
        }
    }

    Ok(args)
}

fn print_usage() {
    println!(
        "Usage: dlend-liquidator [--config <bot.toml>] [--borrowers-file <path>] [address...]\n\n\
         Evaluates the given borrowers against the configured lending pool and\n\
         executes profitable flash liquidations. Reads {} when --config is\n\
         absent and the operator key from {}.",
        env::BOT_CONFIG,
        env::PRIVATE_KEY
    );
}

/// Wire the evaluation and execution pipeline from configuration.
async fn initialize_components(
    config: &BotConfig,
    chain: Arc<ChainClient>,
    private_key: &str,
) -> Result<(Evaluator, ExecutionAdapter)> {
    info!("Initializing components...");

    let config = Arc::new(config.clone());

    let tokens = Arc::new(TokenMetadataResolver::new(chain.clone()));
    let pool = Arc::new(LendingPool::new(
        chain.clone(),
        config.contracts.pool,
        config.contracts.data_provider,
        config.contracts.price_oracle,
    ));

    let odos = Arc::new(
        OdosClient::new()
            .with_base_url(config.aggregator.base_url.clone())
            .with_expected_chain_id(config.chain_id)
            .with_timeout(config.aggregator.quote_timeout()),
    );

    let sender = Arc::new(
        TransactionSender::new(private_key, &config.rpc_url, config.chain_id)
            .await?
            .with_gas_limit(config.execution.gas_limit)
            .with_confirmation_timeout(config.execution.confirmation_timeout()),
    );

    let liquidator_address = config.active_liquidator()?;
    let funding_mode = FundingMode::from(config.execution.funding_mode);
    let contract = LiquidatorContract::new(liquidator_address, funding_mode, sender);

    info!(
        liquidator = %liquidator_address,
        mode = funding_mode.as_str(),
        "Liquidator contract bound"
    );

    // Register token proxies (wrapped/rebasing assets) before any
    // liquidation touches them.
    for (token, proxy) in &config.token_proxies {
        contract
            .set_proxy_contract(*token, *proxy)
            .await
            .with_context(|| format!("registering proxy for token {token}"))?;
    }

    let mut adapter = ExecutionAdapter::new(odos.clone(), contract);
    if let Some(router) = config.aggregator.router {
        adapter = adapter.with_expected_router(router);
    }

    let evaluator = Evaluator::new(chain, pool, tokens, odos, config);

    info!("All components initialized");

    Ok((evaluator, adapter))
}
