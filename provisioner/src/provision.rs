//! Provisioning flows.
//!
//! Each flow is a fixed sequence of confirmed transactions. A failing step
//! aborts the flow and leaves already-confirmed steps in place; re-running a
//! flow against provisioned state fails on the ledger rather than succeeding
//! silently.

use credix_proxy_sdk::instructions::{
    create_credix_pass, create_signing_pda, initialize_market, update_credix_pass,
    DepositFundsBuilder, PassRoles,
};
use credix_proxy_sdk::pda::{derive_credix_pass, CredixPdas};
use credix_proxy_sdk::{
    ActionKind, AugmentedInstruction, ListedMarket, MarketListing, MarketProxy, ProxyConfig,
    ProxyError,
};
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use tracing::info;

use super::bootstrap::list_market;
use super::submitter::SubmissionOrchestrator;

/// Roles granted by [`issue_credix_pass`].
pub const ISSUED_PASS_ROLES: PassRoles = PassRoles {
    is_underwriter: true,
    is_borrower: false,
};

/// Market parameters for [`setup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupParams {
    /// Pool base mint; the market's quote mint.
    pub base_mint: Pubkey,
    /// Base lot size.
    pub base_lot_size: u64,
    /// Quote lot size.
    pub quote_lot_size: u64,
    /// Fee rate in basis points.
    pub fee_rate_bps: u16,
}

/// Result of [`setup`].
#[derive(Debug)]
pub struct SetupReport {
    /// LP mint created with the global market state.
    pub lp_mint: Pubkey,
    /// Deployment PDAs.
    pub pdas: CredixPdas,
    /// Listed LP/base market.
    pub market: ListedMarket,
}

/// Initializes the validating program's global market state with a new LP
/// mint, creates the proxy's permission authority account and lists the
/// LP/base market.
///
/// `config.lp_token_mint` must be `lp_mint`'s address.
///
/// # Errors
///
/// Returns `InvalidSeedInput` on a mint mismatch and the first failing step's
/// error otherwise.
pub async fn setup(
    orchestrator: &SubmissionOrchestrator,
    config: &ProxyConfig,
    lp_mint: &Keypair,
    params: SetupParams,
) -> Result<SetupReport, ProxyError> {
    if config.lp_token_mint != lp_mint.pubkey() {
        return Err(ProxyError::InvalidSeedInput(format!(
            "configured lp mint {} does not match keypair {}",
            config.lp_token_mint,
            lp_mint.pubkey()
        )));
    }
    config.validate()?;
    let pdas = CredixPdas::derive(config)?;
    let payer = orchestrator.payer_pubkey();

    let ix = initialize_market(config, &payer, &params.base_mint)?;
    orchestrator
        .submit("initialize_market", &[ix], &[lp_mint])
        .await?;
    info!(
        global_market_state = %pdas.global_market_state,
        lp_mint = %lp_mint.pubkey(),
        "Global market state initialized"
    );

    let ix = create_signing_pda(&config.proxy_program_id, &payer)?;
    orchestrator.submit("create_signing_pda", &[ix], &[]).await?;
    info!(permission_authority = %pdas.permission_authority, "Permission authority created");

    let listing = MarketListing::new(
        lp_mint.pubkey(),
        params.base_mint,
        params.base_lot_size,
        params.quote_lot_size,
    )
    .with_fee_rate_bps(params.fee_rate_bps);
    let market = list_market(orchestrator, config, listing).await?;

    Ok(SetupReport {
        lp_mint: lp_mint.pubkey(),
        pdas,
        market,
    })
}

/// Creates an active underwriter pass for `participant`.
///
/// Returns the pass address.
///
/// # Errors
///
/// Returns `InvalidSeedInput` for an unset participant, or the ledger error;
/// an existing pass surfaces as `AccountAlreadyInitialized`.
pub async fn issue_credix_pass(
    orchestrator: &SubmissionOrchestrator,
    config: &ProxyConfig,
    participant: &Pubkey,
) -> Result<Pubkey, ProxyError> {
    if *participant == Pubkey::default() {
        return Err(ProxyError::InvalidSeedInput(
            "participant not set".to_string(),
        ));
    }
    let pdas = CredixPdas::derive(config)?;
    let (pass, _) = derive_credix_pass(
        &config.credix_program_id,
        &pdas.global_market_state,
        participant,
    )?;

    let ix = create_credix_pass(
        config,
        &orchestrator.payer_pubkey(),
        participant,
        ISSUED_PASS_ROLES,
    )?;
    orchestrator.submit("create_credix_pass", &[ix], &[]).await?;
    info!(participant = %participant, pass = %pass, "Pass issued");
    Ok(pass)
}

/// Activates or deactivates the pass of `participant`, keeping the issued
/// roles.
///
/// # Errors
///
/// Returns the ledger error.
pub async fn set_credix_pass_active(
    orchestrator: &SubmissionOrchestrator,
    config: &ProxyConfig,
    participant: &Pubkey,
    is_active: bool,
) -> Result<Signature, ProxyError> {
    let ix = update_credix_pass(
        config,
        &orchestrator.payer_pubkey(),
        participant,
        is_active,
        ISSUED_PASS_ROLES,
    )?;
    orchestrator.submit("update_credix_pass", &[ix], &[]).await
}

/// Deposits `amount` base tokens from the payer into the pool.
///
/// # Errors
///
/// Returns `InsufficientBalance` if the payer holds fewer than `amount` base
/// tokens, `PermissionDenied` without an active pass, or another ledger
/// error.
pub async fn deposit(
    orchestrator: &SubmissionOrchestrator,
    config: &ProxyConfig,
    base_mint: &Pubkey,
    amount: u64,
) -> Result<Signature, ProxyError> {
    let investor = orchestrator.payer_pubkey();
    let ix = DepositFundsBuilder::new(config.clone())
        .investor(investor)
        .base_mint(*base_mint)
        .amount(amount)
        .build()?;

    let signature = orchestrator.submit("deposit_funds", &[ix], &[]).await?;
    info!(investor = %investor, amount, "Deposit confirmed");
    Ok(signature)
}

/// Augments a venue instruction for the payer and submits it.
///
/// `signers` are any extra signers the venue instruction needs.
///
/// # Errors
///
/// Returns augmentation errors before anything is sent, otherwise the ledger
/// error; a missing or inactive pass surfaces as `PermissionDenied`.
pub async fn submit_proxied(
    orchestrator: &SubmissionOrchestrator,
    proxy: &MarketProxy,
    action: ActionKind,
    market: &Pubkey,
    instruction: &Instruction,
    signers: &[&Keypair],
) -> Result<(AugmentedInstruction, Signature), ProxyError> {
    let augmented = proxy.augment(action, &orchestrator.payer_pubkey(), market, instruction)?;
    let signature = orchestrator
        .submit(action.as_str(), std::slice::from_ref(&augmented.instruction), signers)
        .await?;
    orchestrator.metrics().record_proxied();
    Ok((augmented, signature))
}
