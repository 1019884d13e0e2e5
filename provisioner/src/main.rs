//! Credix provisioner binary.
//!
//! Usage:
//!
//! ```text
//! credix-provisioner setup
//! credix-provisioner list-market
//! credix-provisioner issue-credix-pass <participant>
//! credix-provisioner deposit <amount>
//! credix-provisioner drain-events <market> <open-orders>...
//! ```

use std::env;
use std::sync::Arc;

use anyhow::{bail, Context};
use credix_proxy_provisioner::config::parse_pubkey;
use credix_proxy_provisioner::{
    deposit, drain_event_queue, issue_credix_pass, list_market, setup, DrainTarget,
    ProvisionerConfig, RpcTransport, SetupParams, SubmissionOrchestrator, TokioClock,
};
use credix_proxy_sdk::{ListedMarket, MarketStateView};
use solana_sdk::signature::{Keypair, Signer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn save_authorities(config: &ProvisionerConfig, market: &ListedMarket) -> anyhow::Result<()> {
    let (prune, crank) = config
        .save_market_authorities(market)
        .context("saving market authorities")?;
    tracing::info!(
        "Prune authority: {} ({})",
        market.prune_authority.pubkey(),
        prune.display()
    );
    tracing::info!(
        "Crank authority: {} ({})",
        market.crank_authority.pubkey(),
        crank.display()
    );
    tracing::info!("Set CREDIX_CRANK_KEYPAIR={} to drain events", crank.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,credix_proxy_provisioner=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        bail!(
            "usage: credix-provisioner \
             <setup|list-market|issue-credix-pass|deposit|drain-events> [args]"
        );
    };

    let config = ProvisionerConfig::from_env().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    let transport = RpcTransport::new(
        config.rpc_url.clone(),
        config.commitment_config()?,
        config.request_timeout(),
        config.confirm_timeout(),
    );
    let payer = config.load_payer()?;

    tracing::info!("Starting Credix provisioner");
    tracing::info!("RPC URL: {}", transport.url());
    tracing::info!("Payer: {}", payer.pubkey());

    let orchestrator = SubmissionOrchestrator::new(Arc::new(transport), payer);

    match (command.as_str(), rest) {
        ("setup", []) => {
            let lp_mint = Keypair::new();
            let proxy_config = config.proxy_config(lp_mint.pubkey())?;
            let params = SetupParams {
                base_mint: config.base_mint()?,
                base_lot_size: config.base_lot_size,
                quote_lot_size: config.quote_lot_size,
                fee_rate_bps: config.fee_rate_bps,
            };
            let report = setup(&orchestrator, &proxy_config, &lp_mint, params).await?;
            tracing::info!("LP mint: {}", report.lp_mint);
            tracing::info!("Global market state: {}", report.pdas.global_market_state);
            tracing::info!("Market: {}", report.market.market);
            tracing::info!("Vault owner: {}", report.market.vault_owner);
            save_authorities(&config, &report.market)?;
        }
        ("list-market", []) => {
            let lp_mint = config.lp_mint()?;
            let proxy_config = config.proxy_config(lp_mint)?;
            let listing = config.listing(lp_mint, config.base_mint()?);
            let listed = list_market(&orchestrator, &proxy_config, listing).await?;
            tracing::info!("Market: {}", listed.market);
            tracing::info!("Event queue: {}", listed.event_queue);
            save_authorities(&config, &listed)?;
        }
        ("issue-credix-pass", [participant]) => {
            let participant = parse_pubkey("participant", participant)?;
            let proxy_config = config.proxy_config(config.lp_mint()?)?;
            let pass = issue_credix_pass(&orchestrator, &proxy_config, &participant).await?;
            tracing::info!("Pass: {}", pass);
        }
        ("deposit", [amount]) => {
            let amount: u64 = amount
                .parse()
                .with_context(|| format!("invalid amount '{amount}'"))?;
            let proxy_config = config.proxy_config(config.lp_mint()?)?;
            let signature =
                deposit(&orchestrator, &proxy_config, &config.base_mint()?, amount).await?;
            tracing::info!("Deposit signature: {}", signature);
        }
        ("drain-events", [market, open_orders @ ..]) if !open_orders.is_empty() => {
            let market = parse_pubkey("market", market)?;
            let open_orders = open_orders
                .iter()
                .map(|oo| parse_pubkey("open_orders", oo))
                .collect::<Result<Vec<_>, _>>()?;
            let data = orchestrator.require_account_data(&market).await?;
            let state = MarketStateView::from_account_data(&data)?;
            let target = DrainTarget {
                dex_program_id: parse_pubkey("dex_program_id", &config.dex_program_id)?,
                market,
                event_queue: state.event_queue,
                open_orders,
            };
            let crank = config.load_crank_authority()?;
            let report = drain_event_queue(
                &orchestrator,
                &TokioClock,
                &target,
                &crank,
                &config.drain_config(),
            )
            .await?;
            tracing::info!(
                "Drained {} events in {} rounds",
                report.initial_events,
                report.rounds
            );
        }
        (other, _) => bail!("unknown command or arguments: {other}"),
    }

    let snapshot = orchestrator.metrics().snapshot();
    tracing::info!(
        submitted = snapshot.transactions_submitted,
        confirmed = snapshot.transactions_confirmed,
        "Provisioner finished"
    );

    Ok(())
}
