//! Market bootstrap runner.
//!
//! Drives a [`MarketBootstrapper`] through its three stages, one confirmed
//! transaction per stage, then checks the initialized market account.

use credix_proxy_sdk::{
    BootstrapStep, ListedMarket, MarketBootstrapper, MarketListing, MarketStateView, ProxyConfig,
    ProxyError,
};
use tracing::info;

use super::submitter::SubmissionOrchestrator;

/// Lists a new market with fresh account keys.
///
/// Rent is quoted from the ledger before any transaction is sent. The first
/// failing stage aborts the run; nothing is rolled back.
///
/// # Errors
///
/// Returns the failing stage's error, or `MarketStateMismatch` if the
/// initialized market does not record the created accounts.
pub async fn list_market(
    orchestrator: &SubmissionOrchestrator,
    config: &ProxyConfig,
    listing: MarketListing,
) -> Result<ListedMarket, ProxyError> {
    let rent = orchestrator.rent_schedule().await?;
    let bootstrapper =
        MarketBootstrapper::new(config.clone(), orchestrator.payer_pubkey(), listing, rent)?;
    run_bootstrap(orchestrator, bootstrapper).await
}

/// Runs every remaining stage of `bootstrapper` in order and verifies the
/// result.
///
/// # Errors
///
/// Returns the failing stage's error, `AccountNotFound` if the market account
/// is missing afterwards, or `MarketStateMismatch`.
pub async fn run_bootstrap(
    orchestrator: &SubmissionOrchestrator,
    mut bootstrapper: MarketBootstrapper,
) -> Result<ListedMarket, ProxyError> {
    info!(
        market = %bootstrapper.market(),
        base_mint = %bootstrapper.listing().base_mint,
        quote_mint = %bootstrapper.listing().quote_mint,
        "Listing market"
    );

    while let Some(step) = bootstrapper.next_step() {
        run_step(orchestrator, &mut bootstrapper, step).await?;
    }

    let data = orchestrator
        .require_account_data(&bootstrapper.market())
        .await?;
    let state = MarketStateView::from_account_data(&data)?;
    bootstrapper.verify(&state)?;

    let listed = bootstrapper.finish()?;
    info!(
        market = %listed.market,
        vault_owner = %listed.vault_owner,
        nonce = listed.vault_signer_nonce,
        "Market listed"
    );
    Ok(listed)
}

/// Submits one stage and marks it complete.
///
/// # Errors
///
/// Returns `BootstrapOrder` if `step` is not next, without submitting
/// anything, or the submission error.
pub async fn run_step(
    orchestrator: &SubmissionOrchestrator,
    bootstrapper: &mut MarketBootstrapper,
    step: BootstrapStep,
) -> Result<(), ProxyError> {
    {
        let stage = bootstrapper.stage(step)?;
        orchestrator
            .submit(step.as_str(), &stage.instructions, &stage.signers)
            .await?;
    }
    bootstrapper.complete(step)
}
